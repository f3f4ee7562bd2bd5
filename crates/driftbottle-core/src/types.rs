// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record and adapter types shared across the Driftbottle workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sentinel value for a preference field the user never set.
pub const UNSET: &str = "unset";

/// Opaque, caller-supplied user identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique letter identifier, a random UUID v4 rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LetterId(pub String);

impl LetterId {
    /// Generates a fresh, collision-free letter id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LetterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LetterId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Receiving preferences stated by a user.
///
/// Both fields are always present. `emotion` is the user's self-declared
/// mood and only colours matching; `custom` describes the content the user
/// wants to receive and is the receiver-side filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub emotion: String,
    pub custom: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            emotion: UNSET.to_string(),
            custom: UNSET.to_string(),
        }
    }
}

impl Preferences {
    /// True when `custom` carries no preference (universal acceptor).
    pub fn accepts_anything(&self) -> bool {
        is_unset(&self.custom)
    }

    /// True when `emotion` carries no information.
    pub fn emotion_unset(&self) -> bool {
        is_unset(&self.emotion)
    }
}

fn is_unset(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNSET)
}

/// A registered user and their mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub preferences: Preferences,
    /// FIFO of routed-but-unopened letters, oldest first.
    #[serde(default)]
    pub unopened_letter_ids: Vec<LetterId>,
    /// Append-only history of opened letters.
    #[serde(default)]
    pub received_letter_ids: Vec<LetterId>,
    /// Append-only history of submitted letters.
    #[serde(default)]
    pub sent_letter_ids: Vec<LetterId>,
    pub registered_at: DateTime<Utc>,
    /// `None` means the user never opened a letter and is not cooling down.
    #[serde(default)]
    pub last_letter_retrieved_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(registered_at: DateTime<Utc>) -> Self {
        Self {
            preferences: Preferences::default(),
            unopened_letter_ids: Vec::new(),
            received_letter_ids: Vec::new(),
            sent_letter_ids: Vec::new(),
            registered_at,
            last_letter_retrieved_at: None,
        }
    }

    /// Number of letters this user has opened (the fairness signal).
    pub fn received_count(&self) -> usize {
        self.received_letter_ids.len()
    }
}

/// A possible recipient as seen by the matcher: everything except the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub user_id: UserId,
    pub preferences: Preferences,
    /// Letters opened so far.
    pub received_count: usize,
}

/// Routing state of a letter.
///
/// Serialized as a one-element JSON array: `["waiting"]`, `["alice"]`,
/// `["rejected"]`. The sentinel tokens are reserved and cannot be user ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub enum RecipientState {
    /// Submitted, routing runs in the same request.
    Waiting,
    /// Submitted, routing deferred to the background worker.
    WaitingForProcess,
    /// Accepted and assigned to a concrete user.
    Routed(UserId),
    /// Failed moderation.
    Rejected,
    /// Routing ran and no candidate qualified.
    NoSuitableRecipient,
    /// The matcher's pick vanished (or was invalid) before assignment.
    RecipientNotFound,
}

impl RecipientState {
    const WAITING: &'static str = "waiting";
    const WAITING_FOR_PROCESS: &'static str = "waiting_for_process";
    const REJECTED: &'static str = "rejected";
    const NO_SUITABLE_RECIPIENT: &'static str = "no_suitable_recipient";
    const RECIPIENT_NOT_FOUND: &'static str = "error_recipient_not_found";

    /// All sentinel tokens; none of these may be used as a user id.
    pub const RESERVED: [&'static str; 5] = [
        Self::WAITING,
        Self::WAITING_FOR_PROCESS,
        Self::REJECTED,
        Self::NO_SUITABLE_RECIPIENT,
        Self::RECIPIENT_NOT_FOUND,
    ];

    pub fn as_token(&self) -> &str {
        match self {
            Self::Waiting => Self::WAITING,
            Self::WaitingForProcess => Self::WAITING_FOR_PROCESS,
            Self::Routed(user) => user.as_str(),
            Self::Rejected => Self::REJECTED,
            Self::NoSuitableRecipient => Self::NO_SUITABLE_RECIPIENT,
            Self::RecipientNotFound => Self::RECIPIENT_NOT_FOUND,
        }
    }

    pub fn from_token(token: &str) -> Self {
        match token {
            Self::WAITING => Self::Waiting,
            Self::WAITING_FOR_PROCESS => Self::WaitingForProcess,
            Self::REJECTED => Self::Rejected,
            Self::NO_SUITABLE_RECIPIENT => Self::NoSuitableRecipient,
            Self::RECIPIENT_NOT_FOUND => Self::RecipientNotFound,
            other => Self::Routed(UserId(other.to_string())),
        }
    }

    pub fn is_reserved(token: &str) -> bool {
        Self::RESERVED.contains(&token)
    }

    /// True until routing has run.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Waiting | Self::WaitingForProcess)
    }

    pub fn recipient(&self) -> Option<&UserId> {
        match self {
            Self::Routed(user) => Some(user),
            _ => None,
        }
    }
}

impl fmt::Display for RecipientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl From<RecipientState> for Vec<String> {
    fn from(state: RecipientState) -> Self {
        vec![state.as_token().to_string()]
    }
}

impl TryFrom<Vec<String>> for RecipientState {
    type Error = String;

    fn try_from(tokens: Vec<String>) -> Result<Self, Self::Error> {
        match tokens.as_slice() {
            [token] => Ok(Self::from_token(token)),
            other => Err(format!(
                "recipient state must hold exactly one entry, found {}",
                other.len()
            )),
        }
    }
}

/// Coarse emotional register of a letter or of a desired incoming letter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tone {
    Upbeat,
    Somber,
    Neutral,
}

/// Justification recorded when a letter is routed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingInfo {
    /// Human-readable reason for the outcome.
    pub reason: String,
    /// The matcher's raw pick before validation.
    #[serde(default)]
    pub chosen_candidate: Option<UserId>,
    /// Tone inferred from the letter text.
    #[serde(default)]
    pub inferred_tone: Option<Tone>,
    /// Classifier reading of the letter, when analysis is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

/// What a letter is about, as read by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub emotion: String,
    pub topic: String,
    pub summary: String,
}

/// A submitted letter and its routing/delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterRecord {
    pub date_sent: DateTime<Utc>,
    /// `None` until the recipient opens the letter.
    #[serde(default)]
    pub date_received: Option<DateTime<Utc>>,
    pub sender_id: UserId,
    pub recipient: RecipientState,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub routing_info: RoutingInfo,
}

/// Recipient-facing view of a letter. Omits the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterView {
    pub letter_id: LetterId,
    pub title: String,
    pub content: String,
    pub date_sent: DateTime<Utc>,
    pub date_received: Option<DateTime<Utc>>,
}

impl LetterView {
    pub fn from_record(letter_id: &LetterId, record: &LetterRecord) -> Self {
        Self {
            letter_id: letter_id.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            date_sent: record.date_sent,
            date_received: record.date_received,
        }
    }
}

/// Names of the two persisted collections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum CollectionKey {
    Users,
    Letters,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
}

// --- Provider types ---

/// A single message in a provider conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

/// A single-shot completion request to a classification provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
}

impl ProviderRequest {
    /// Builds a one-turn request from a prompt.
    pub fn single_turn(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            messages: vec![ProviderMessage {
                role: "user".to_string(),
                content: prompt.into(),
            }],
            max_tokens,
        }
    }
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A completed provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub id: String,
    /// Concatenated text content.
    pub content: String,
    pub model: String,
    /// Why generation stopped. `"refusal"` means the provider's own safety
    /// layer intercepted the input.
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

impl ProviderResponse {
    pub const REFUSAL: &'static str = "refusal";

    pub fn is_refusal(&self) -> bool {
        self.stop_reason.as_deref() == Some(Self::REFUSAL)
    }
}

// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed front for the classification provider.
//!
//! All prompt construction and free-text parsing live here. Callers only see
//! [`ModerationAnswer`], [`OracleVerdict`], and [`Analysis`].

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use driftbottle_core::{Analysis, Candidate, ProviderAdapter, ProviderRequest, UserId};

/// Binary moderation prompt. Answer is a single word.
fn moderation_prompt(letter: &str) -> String {
    format!(
        r#"You review anonymous letters before they are delivered to a stranger.
Answer "yes" if the letter below contains any of:
- violent threats or encouragement of self-harm
- harassment or hate speech
- sexual content
- other content unacceptable to send to an unknown recipient
Be especially strict about direct-harm phrases such as "die", "kill yourself", 死ね or 殺す aimed at the reader.
Otherwise answer "no".

Answer with exactly one word, yes or no.

Letter:
{letter}"#
    )
}

/// Recipient-selection prompt. Answer is a JSON object.
fn matching_prompt(candidates: &str, letter: &str) -> String {
    format!(
        r#"You choose who should receive an anonymous letter.
Each candidate lists the mood they declared and the kind of letter they want to receive ("unset" means they accept anything).
Pick the single candidate who would most welcome this letter. If nobody would, pick nobody.

Candidates:
{candidates}

Letter:
{letter}

Reply with JSON only: {{"recipient": "<candidate id or null>", "reason": "<one sentence>"}}"#
    )
}

/// Letter analysis prompt. Answer is a JSON object.
fn analysis_prompt(letter: &str) -> String {
    format!(
        r#"You read anonymous letters sent out like messages in a bottle.
Name the main emotion the writer expresses, the topic of the letter, and summarize it in one short sentence.
Answer in the language of the letter.

Letter:
{letter}

Reply with JSON only: {{"emotion": "<emotion>", "topic": "<topic>", "summary": "<summary>"}}"#
    )
}

/// Outcome of a moderation question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAnswer {
    Flagged,
    Clear,
    /// The provider's own safety layer refused the input.
    Blocked { reason: String },
    /// No usable answer: transport error, API error, or unparseable text.
    Unavailable { reason: String },
}

/// Outcome of a recipient-selection question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleVerdict {
    /// The raw pick. Not validated against the candidate list.
    Matched { id: UserId, reason: String },
    NoMatch { reason: String },
    Blocked { reason: String },
    Unavailable { reason: String },
}

/// Classification oracle backed by any [`ProviderAdapter`].
#[derive(Clone)]
pub struct Oracle {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
    max_tokens: u32,
}

enum Reply {
    Text(String),
    Refused,
    Failed(String),
}

impl Oracle {
    pub fn new(provider: Arc<dyn ProviderAdapter>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn ask(&self, prompt: String) -> Reply {
        let request = ProviderRequest::single_turn(&self.model, prompt, self.max_tokens);
        match self.provider.complete(request).await {
            Ok(response) if response.is_refusal() => Reply::Refused,
            Ok(response) => {
                debug!(id = %response.id, answer = %response.content, "oracle answered");
                Reply::Text(response.content)
            }
            Err(e) => Reply::Failed(e.to_string()),
        }
    }

    /// Asks whether a letter is inappropriate to deliver.
    pub async fn moderate(&self, review_text: &str) -> ModerationAnswer {
        match self.ask(moderation_prompt(review_text)).await {
            Reply::Refused => ModerationAnswer::Blocked {
                reason: "classifier refused to read the letter".to_string(),
            },
            Reply::Failed(reason) => ModerationAnswer::Unavailable { reason },
            Reply::Text(text) => match parse_yes_no(&text) {
                Some(true) => ModerationAnswer::Flagged,
                Some(false) => ModerationAnswer::Clear,
                None => {
                    warn!(answer = %text, "unparseable moderation answer");
                    ModerationAnswer::Unavailable {
                        reason: format!("unparseable answer: {}", truncate(&text, 60)),
                    }
                }
            },
        }
    }

    /// Asks which candidate should receive a letter.
    pub async fn pick_recipient(&self, letter_text: &str, shortlist: &[Candidate]) -> OracleVerdict {
        let candidates = shortlist
            .iter()
            .map(|c| {
                format!(
                    "- id: {}, mood: {}, wants: {}",
                    c.user_id, c.preferences.emotion, c.preferences.custom
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        match self.ask(matching_prompt(&candidates, letter_text)).await {
            Reply::Refused => OracleVerdict::Blocked {
                reason: "classifier refused to read the letter".to_string(),
            },
            Reply::Failed(reason) => OracleVerdict::Unavailable { reason },
            Reply::Text(text) => parse_pick(&text).unwrap_or_else(|| {
                warn!(answer = %text, "unparseable matching answer");
                OracleVerdict::Unavailable {
                    reason: format!("unparseable answer: {}", truncate(&text, 60)),
                }
            }),
        }
    }

    /// Reads the emotion, topic, and summary of a letter.
    ///
    /// Returns `None` when the provider fails, refuses, or answers off-format.
    pub async fn analyze(&self, letter_text: &str) -> Option<Analysis> {
        match self.ask(analysis_prompt(letter_text)).await {
            Reply::Text(text) => {
                let analysis = parse_analysis(&text);
                if analysis.is_none() {
                    warn!(answer = %text, "unparseable analysis answer");
                }
                analysis
            }
            Reply::Refused => {
                warn!("classifier refused to analyze the letter");
                None
            }
            Reply::Failed(reason) => {
                warn!(error = %reason, "letter analysis unavailable");
                None
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Reads a leading yes/no, tolerating punctuation, quotes, and case.
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    let first = answer
        .trim()
        .split(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | '!' | ':' | '"' | '\'' | '*' | '`'))
        .find(|w| !w.is_empty())?
        .to_lowercase();
    match first.as_str() {
        "yes" | "はい" => Some(true),
        "no" | "いいえ" => Some(false),
        _ => None,
    }
}

#[derive(Deserialize)]
struct PickReply {
    recipient: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Extracts the JSON object from an answer, tolerating code fences and chatter.
pub fn parse_pick(answer: &str) -> Option<OracleVerdict> {
    let trimmed = answer.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    let reply: PickReply = serde_json::from_str(&trimmed[start..=end]).ok()?;
    let reason = reply
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "oracle gave no reason".to_string());

    Some(match reply.recipient.map(|r| r.trim().to_string()) {
        Some(id) if !id.is_empty() && id != "null" => OracleVerdict::Matched {
            id: UserId(id),
            reason,
        },
        _ => OracleVerdict::NoMatch { reason },
    })
}

/// Extracts the JSON object from an analysis answer. Every field must be non-empty.
pub fn parse_analysis(answer: &str) -> Option<Analysis> {
    let trimmed = answer.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    let analysis: Analysis = serde_json::from_str(&trimmed[start..=end]).ok()?;
    let filled = [&analysis.emotion, &analysis.topic, &analysis.summary]
        .iter()
        .all(|field| !field.trim().is_empty());
    filled.then_some(analysis)
}

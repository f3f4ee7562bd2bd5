// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Driftbottle relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Every section and the keys it accepts, in file order.
pub const KEYS: &[(&str, &[&str])] = &[
    ("service", &["name", "log_level", "log_file"]),
    ("storage", &["data_dir", "users_file", "letters_file"]),
    ("mailbox", &["cooldown_secs"]),
    (
        "routing",
        &["mode", "matcher", "moderation_oracle", "analysis", "queue_capacity"],
    ),
    ("anthropic", &["api_key", "model", "max_tokens", "api_version"]),
    ("gateway", &["host", "port"]),
];

/// Keys accepted in `section`, if it exists.
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    KEYS.iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// Top-level Driftbottle configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DriftbottleConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Where the user and letter collections live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Mailbox retrieval policy.
    #[serde(default)]
    pub mailbox: MailboxConfig,

    /// Moderation and matching pipeline.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Anthropic API settings for the classification oracle.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// HTTP gateway bind settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional file that receives a plain-text copy of the log stream.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_service_name() -> String {
    "driftbottle".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the JSON collection files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// File name of the user collection, relative to `data_dir`.
    #[serde(default = "default_users_file")]
    pub users_file: String,

    /// File name of the letter collection, relative to `data_dir`.
    #[serde(default = "default_letters_file")]
    pub letters_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            users_file: default_users_file(),
            letters_file: default_letters_file(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("driftbottle"))
        .unwrap_or_else(|| std::path::PathBuf::from("data"))
        .to_string_lossy()
        .into_owned()
}

fn default_users_file() -> String {
    "users.json".to_string()
}

fn default_letters_file() -> String {
    "letters.json".to_string()
}

/// Mailbox retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MailboxConfig {
    /// Minimum seconds between two successful opens by the same user.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    3600
}

/// When routing runs relative to submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoutingMode {
    /// Route inside the submitting request.
    #[default]
    Synchronous,
    /// Return immediately and route on a background worker.
    Deferred,
}

/// Which recipient matcher to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatcherKind {
    /// Local lexicon scoring with fairness ranking.
    #[default]
    Heuristic,
    /// Ask the classification oracle to pick from the fairness shortlist.
    Oracle,
}

/// Moderation and matching pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    #[serde(default)]
    pub mode: RoutingMode,

    #[serde(default)]
    pub matcher: MatcherKind,

    /// Run the classifier stage of moderation when an API key is available.
    #[serde(default = "default_moderation_oracle")]
    pub moderation_oracle: bool,

    /// Ask the classifier for the emotion, topic, and summary of each letter
    /// that passes moderation. Needs an API key.
    #[serde(default)]
    pub analysis: bool,

    /// Capacity of the deferred routing queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            matcher: MatcherKind::default(),
            moderation_oracle: default_moderation_oracle(),
            analysis: false,
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_moderation_oracle() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    256
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` falls back to `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for moderation and matching prompts.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens to generate per classification.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation gate.
//!
//! Two stages: a fixed direct-harm lexicon that blocks on sight, then an
//! optional classifier question. Classifier trouble lets the letter through;
//! a classifier refusal blocks it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::oracle::{ModerationAnswer, Oracle};

/// Direct-harm phrases, matched against normalized (lowercased,
/// whitespace-collapsed) title and content.
const DIRECT_HARM: &[&str] = &[
    "kill yourself",
    "kill urself",
    "kys",
    "go die",
    "you should die",
    "hope you die",
    "i will kill you",
    "i'll kill you",
    "i'm going to kill you",
    "im going to kill you",
    "going to murder you",
    "die in a fire",
    "end your life",
    "nobody would miss you",
    "worthless piece of",
    "死ね",
    "しね",
    "殺す",
    "殺してやる",
    "消えろ",
    "くたばれ",
];

/// Verdict of the gate, with the reason that is recorded on the letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationVerdict {
    Allow { reason: String },
    Block { reason: String },
}

impl ModerationVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Allow { reason } | Self::Block { reason } => reason,
        }
    }
}

/// Screens letters before routing.
#[derive(Clone, Default)]
pub struct ModerationGate {
    oracle: Option<Arc<Oracle>>,
}

impl ModerationGate {
    /// Lexicon only.
    pub fn lexicon_only() -> Self {
        Self { oracle: None }
    }

    /// Lexicon, then the classifier.
    pub fn with_oracle(oracle: Arc<Oracle>) -> Self {
        Self {
            oracle: Some(oracle),
        }
    }

    pub fn uses_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// Decides whether a letter may be delivered.
    pub async fn is_inappropriate(&self, title: &str, content: &str) -> ModerationVerdict {
        let review_text = format!("{title}\n{content}");

        if let Some(phrase) = direct_harm_phrase(&review_text) {
            info!(phrase, "letter blocked by direct-harm screen");
            return ModerationVerdict::Block {
                reason: format!("direct-harm phrase `{phrase}`"),
            };
        }

        let Some(oracle) = &self.oracle else {
            return ModerationVerdict::Allow {
                reason: "passed lexicon screen, no classifier configured".to_string(),
            };
        };

        match oracle.moderate(&review_text).await {
            ModerationAnswer::Flagged => ModerationVerdict::Block {
                reason: "classifier flagged the letter".to_string(),
            },
            ModerationAnswer::Clear => ModerationVerdict::Allow {
                reason: "classifier cleared the letter".to_string(),
            },
            ModerationAnswer::Blocked { reason } => {
                warn!(%reason, "classifier refused letter, blocking");
                ModerationVerdict::Block { reason }
            }
            ModerationAnswer::Unavailable { reason } => {
                warn!(%reason, "classifier unavailable, allowing letter");
                ModerationVerdict::Allow {
                    reason: format!("classifier unavailable ({reason}), allowed"),
                }
            }
        }
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace(['\u{2019}', '\u{2018}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the first direct-harm phrase found in `text`.
///
/// Latin-script phrases must sit on word boundaries so that "skys" does not
/// match "kys"; CJK phrases match anywhere.
pub fn direct_harm_phrase(text: &str) -> Option<&'static str> {
    let normalized = normalize(text);
    DIRECT_HARM.iter().copied().find(|phrase| {
        if !phrase.is_ascii() {
            return normalized.contains(phrase);
        }
        normalized.match_indices(phrase).any(|(start, _)| {
            let before = normalized[..start].chars().next_back();
            let after = normalized[start + phrase.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
    })
}

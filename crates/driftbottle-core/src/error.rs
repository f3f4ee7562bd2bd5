// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Driftbottle relay.

use thiserror::Error;

/// The primary error type used across all Driftbottle adapter traits and core operations.
#[derive(Debug, Error)]
pub enum DriftbottleError {
    /// Configuration errors (invalid TOML, missing credentials, bad header values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence errors (I/O failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required field was missing or empty. No state was mutated.
    #[error("invalid request: {message}")]
    Validation { message: String },

    /// A referenced user or letter does not exist (or is not in the expected mailbox list).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Classification provider errors (API failure, unparseable response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DriftbottleError {
    /// Shorthand for a [`DriftbottleError::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`DriftbottleError::NotFound`] error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Driftbottle relay.
//!
//! This crate provides the record types (users, letters, routing states),
//! the error type, the clock abstraction, and the adapter traits the rest of
//! the workspace is built on.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DriftbottleError;
pub use types::{
    AdapterType, Analysis, Candidate, CollectionKey, HealthStatus, LetterId, LetterRecord, LetterView,
    Preferences, ProviderMessage, ProviderRequest, ProviderResponse, RecipientState, RoutingInfo,
    TokenUsage, Tone, UserId, UserRecord, UNSET,
};

// Re-export all adapter traits at crate root.
pub use traits::{CollectionStore, PluginAdapter, ProviderAdapter};

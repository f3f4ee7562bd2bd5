// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for collection persistence.

use async_trait::async_trait;

use crate::error::DriftbottleError;
use crate::traits::adapter::PluginAdapter;
use crate::types::CollectionKey;

/// Durable home for the serialized `users` and `letters` collections.
///
/// Implementations store whole snapshots: a `write` replaces the previous
/// contents atomically, so a reader never observes a half-written collection.
#[async_trait]
pub trait CollectionStore: PluginAdapter {
    /// Returns the stored snapshot, or `None` if nothing was ever written.
    async fn read(&self, key: CollectionKey) -> Result<Option<String>, DriftbottleError>;

    /// Replaces the stored snapshot.
    async fn write(&self, key: CollectionKey, contents: &str) -> Result<(), DriftbottleError>;
}

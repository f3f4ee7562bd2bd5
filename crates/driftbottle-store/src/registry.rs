// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared registry of users and letters.
//!
//! Both collections sit behind a single async mutex. Every read-modify-write
//! and the save that follows it happen while the guard is held, so two
//! concurrent requests can never overwrite each other's appends.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use driftbottle_core::{
    Clock, CollectionKey, CollectionStore, DriftbottleError, HealthStatus, LetterId,
    LetterRecord, UserId, UserRecord,
};

use crate::persistence::{load_collection, save_collection};

/// The user collection, keyed by user id.
pub type Users = BTreeMap<UserId, UserRecord>;

/// The letter collection, keyed by letter id.
pub type Letters = BTreeMap<LetterId, LetterRecord>;

/// In-memory copy of both collections.
#[derive(Debug, Default)]
pub(crate) struct Collections {
    pub(crate) users: Users,
    pub(crate) letters: Letters,
}

/// Owner of all relay state.
pub struct Registry {
    store: Arc<dyn CollectionStore>,
    clock: Arc<dyn Clock>,
    cooldown: chrono::Duration,
    state: Mutex<Collections>,
}

/// Saturates at the largest span chrono can represent.
fn cooldown_from_secs(secs: u64) -> chrono::TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .unwrap_or(chrono::TimeDelta::MAX)
}

impl Registry {
    /// Loads both collections from `store`, healing missing or corrupt documents.
    pub async fn open(
        store: Arc<dyn CollectionStore>,
        clock: Arc<dyn Clock>,
        cooldown_secs: u64,
    ) -> Result<Self, DriftbottleError> {
        let users: Users = load_collection(store.as_ref(), CollectionKey::Users).await?;
        let letters: Letters = load_collection(store.as_ref(), CollectionKey::Letters).await?;

        info!(
            store = store.name(),
            users = users.len(),
            letters = letters.len(),
            cooldown_secs,
            "registry loaded"
        );

        Ok(Self {
            store,
            clock,
            cooldown: cooldown_from_secs(cooldown_secs),
            state: Mutex::new(Collections { users, letters }),
        })
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub(crate) fn cooldown(&self) -> chrono::Duration {
        self.cooldown
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Collections> {
        self.state.lock().await
    }

    pub(crate) async fn save_users(&self, state: &Collections) -> bool {
        save_collection(self.store.as_ref(), CollectionKey::Users, &state.users).await
    }

    pub(crate) async fn save_letters(&self, state: &Collections) -> bool {
        save_collection(self.store.as_ref(), CollectionKey::Letters, &state.letters).await
    }

    pub(crate) async fn save_all(&self, state: &Collections) {
        self.save_users(state).await;
        self.save_letters(state).await;
    }

    /// Health of the underlying store.
    pub async fn health(&self) -> Result<HealthStatus, DriftbottleError> {
        self.store.health_check().await
    }

    /// Flushes both collections and releases the store.
    pub async fn shutdown(&self) -> Result<(), DriftbottleError> {
        {
            let state = self.lock().await;
            self.save_all(&state).await;
        }
        self.store.shutdown().await
    }

    /// Name of the underlying store adapter.
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Counts of registered users and stored letters.
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.lock().await;
        (state.users.len(), state.letters.len())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("store", &self.store.name())
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

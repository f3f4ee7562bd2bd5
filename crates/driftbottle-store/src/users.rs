// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User registration and preferences.

use tracing::info;

use driftbottle_core::{DriftbottleError, Preferences, RecipientState, UserId, UserRecord};

use crate::registry::{Collections, Registry};

/// Rejects ids that are empty or collide with a recipient-state token.
pub fn validate_user_id(id: &UserId) -> Result<(), DriftbottleError> {
    if id.as_str().trim().is_empty() {
        return Err(DriftbottleError::validation("user_id must not be empty"));
    }
    if RecipientState::is_reserved(id.as_str()) {
        return Err(DriftbottleError::validation(format!(
            "user_id `{id}` is reserved"
        )));
    }
    Ok(())
}

impl Collections {
    /// Creates the user if absent. Returns whether it was created.
    pub(crate) fn ensure_user(&mut self, id: &UserId, now: chrono::DateTime<chrono::Utc>) -> bool {
        if self.users.contains_key(id) {
            return false;
        }
        self.users.insert(id.clone(), UserRecord::new(now));
        info!(user_id = %id, "user registered");
        true
    }
}

impl Registry {
    /// Returns the user's record, creating it with default preferences on first contact.
    pub async fn ensure_user(&self, id: &UserId) -> Result<(bool, UserRecord), DriftbottleError> {
        validate_user_id(id)?;

        let mut state = self.lock().await;
        let created = state.ensure_user(id, self.now());
        if created {
            self.save_users(&state).await;
        }

        let record = state
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| DriftbottleError::Internal(format!("user {id} vanished")))?;
        Ok((created, record))
    }

    /// Overwrites both preference fields, registering the user if needed.
    pub async fn update_preferences(
        &self,
        id: &UserId,
        emotion: &str,
        custom: &str,
    ) -> Result<Preferences, DriftbottleError> {
        validate_user_id(id)?;

        let mut state = self.lock().await;
        state.ensure_user(id, self.now());

        let user = state
            .users
            .get_mut(id)
            .ok_or_else(|| DriftbottleError::Internal(format!("user {id} vanished")))?;
        user.preferences = Preferences {
            emotion: emotion.to_string(),
            custom: custom.to_string(),
        };
        let preferences = user.preferences.clone();
        self.save_users(&state).await;

        info!(user_id = %id, "preferences updated");
        Ok(preferences)
    }

    /// Returns a copy of the user's record without registering anyone.
    pub async fn user(&self, id: &UserId) -> Option<UserRecord> {
        self.lock().await.users.get(id).cloned()
    }
}

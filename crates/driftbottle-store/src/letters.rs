// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Letter lifecycle: submission, the one-shot routing transition, and the
//! recipient's mailbox (fetch, open, history).
//!
//! ```text
//! waiting | waiting_for_process
//!     -> rejected | routed(u) | no_suitable_recipient | error_recipient_not_found
//! routed(u) -> opened (date_received set)
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use driftbottle_core::{
    Analysis, Candidate, DriftbottleError, LetterId, LetterRecord, LetterView, RecipientState, RoutingInfo,
    Tone, UserId,
};

use crate::registry::{Collections, Registry};
use crate::users::validate_user_id;

/// What the moderation and matching stages decided for a letter.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    /// Moderation blocked the letter.
    Reject { reason: String },
    /// The matcher picked a user. Not yet validated.
    Deliver {
        pick: UserId,
        reason: String,
        tone: Option<Tone>,
    },
    /// No candidate qualified.
    NoMatch { reason: String, tone: Option<Tone> },
}

/// Everything routing needs, copied out so the lock can be released.
#[derive(Debug, Clone)]
pub struct RoutingSnapshot {
    pub letter_id: LetterId,
    pub sender_id: UserId,
    pub title: String,
    pub content: String,
    /// Every registered user except the sender.
    pub candidates: Vec<Candidate>,
}

/// Result of asking for the next unopened letter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextLetter {
    /// The user opened a letter too recently.
    Cooldown { remaining_secs: u64 },
    /// Nothing is waiting.
    Empty,
    /// The oldest unopened letter. It stays queued until opened.
    Letter(LetterView),
    /// The head of the queue referenced a missing letter and was dropped.
    Stale { removed: LetterId },
}

/// Sender-facing delivery state. Never reveals who the recipient is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Waiting,
    WaitingForProcess,
    Delivered,
    Opened,
    Rejected,
    NoSuitableRecipient,
    #[serde(rename = "error_recipient_not_found")]
    #[strum(serialize = "error_recipient_not_found")]
    RecipientNotFound,
}

impl DeliveryStatus {
    /// Status for a routing state alone. Routed letters read as delivered.
    pub fn of_state(state: &RecipientState) -> Self {
        match state {
            RecipientState::Waiting => Self::Waiting,
            RecipientState::WaitingForProcess => Self::WaitingForProcess,
            RecipientState::Routed(_) => Self::Delivered,
            RecipientState::Rejected => Self::Rejected,
            RecipientState::NoSuitableRecipient => Self::NoSuitableRecipient,
            RecipientState::RecipientNotFound => Self::RecipientNotFound,
        }
    }

    fn of(record: &LetterRecord) -> Self {
        match &record.recipient {
            RecipientState::Routed(_) if record.date_received.is_some() => Self::Opened,
            state => Self::of_state(state),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LetterStatus {
    pub letter_id: LetterId,
    pub status: DeliveryStatus,
    pub date_sent: DateTime<Utc>,
    pub date_received: Option<DateTime<Utc>>,
}

/// A letter that has not reached a recipient, for operator inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedLetter {
    pub letter_id: LetterId,
    pub sender_id: UserId,
    pub state: RecipientState,
    pub date_sent: DateTime<Utc>,
    pub reason: String,
}

fn letter_not_found(id: &LetterId) -> DriftbottleError {
    DriftbottleError::not_found("letter", id.as_str())
}

fn user_not_found(id: &UserId) -> DriftbottleError {
    DriftbottleError::not_found("user", id.as_str())
}

impl Registry {
    /// Stores a new letter from `sender` in a pending state.
    pub async fn submit(
        &self,
        sender: &UserId,
        title: &str,
        content: &str,
        initial_state: RecipientState,
    ) -> Result<LetterId, DriftbottleError> {
        validate_user_id(sender)?;
        if content.trim().is_empty() {
            return Err(DriftbottleError::validation("content must not be empty"));
        }
        if !initial_state.is_pending() {
            return Err(DriftbottleError::Internal(format!(
                "letters must start pending, not `{initial_state}`"
            )));
        }

        let mut state = self.lock().await;
        let now = self.now();
        state.ensure_user(sender, now);

        let letter_id = LetterId::generate();
        state.letters.insert(
            letter_id.clone(),
            LetterRecord {
                date_sent: now,
                date_received: None,
                sender_id: sender.clone(),
                recipient: initial_state.clone(),
                title: title.to_string(),
                content: content.to_string(),
                routing_info: RoutingInfo::default(),
            },
        );
        if let Some(user) = state.users.get_mut(sender) {
            user.sent_letter_ids.push(letter_id.clone());
        }
        self.save_all(&state).await;

        info!(letter_id = %letter_id, sender = %sender, state = %initial_state, "letter submitted");
        Ok(letter_id)
    }

    /// Copies out the letter and its candidate pool, or `None` if the letter
    /// has already left the pending states.
    pub async fn routing_snapshot(
        &self,
        letter_id: &LetterId,
    ) -> Result<Option<RoutingSnapshot>, DriftbottleError> {
        let state = self.lock().await;
        let letter = state
            .letters
            .get(letter_id)
            .ok_or_else(|| letter_not_found(letter_id))?;

        if !letter.recipient.is_pending() {
            return Ok(None);
        }

        let candidates = state
            .users
            .iter()
            .filter(|(id, _)| **id != letter.sender_id)
            .map(|(id, user)| Candidate {
                user_id: id.clone(),
                preferences: user.preferences.clone(),
                received_count: user.received_count(),
            })
            .collect();

        Ok(Some(RoutingSnapshot {
            letter_id: letter_id.clone(),
            sender_id: letter.sender_id.clone(),
            title: letter.title.clone(),
            content: letter.content.clone(),
            candidates,
        }))
    }

    /// Applies the routing decision. Runs at most once per letter: a letter
    /// that already left the pending states is returned unchanged.
    pub async fn apply_routing(
        &self,
        letter_id: &LetterId,
        decision: RoutingDecision,
    ) -> Result<RecipientState, DriftbottleError> {
        let mut state = self.lock().await;
        let Collections { users, letters } = &mut *state;

        let letter = letters
            .get_mut(letter_id)
            .ok_or_else(|| letter_not_found(letter_id))?;
        if !letter.recipient.is_pending() {
            info!(letter_id = %letter_id, state = %letter.recipient, "letter already routed, skipping");
            return Ok(letter.recipient.clone());
        }

        let (outcome, routing_info) = match decision {
            RoutingDecision::Reject { reason } => (
                RecipientState::Rejected,
                RoutingInfo {
                    reason,
                    chosen_candidate: None,
                    inferred_tone: None,
                    analysis: None,
                },
            ),
            RoutingDecision::NoMatch { reason, tone } => (
                RecipientState::NoSuitableRecipient,
                RoutingInfo {
                    reason,
                    chosen_candidate: None,
                    inferred_tone: tone,
                    analysis: None,
                },
            ),
            RoutingDecision::Deliver { pick, reason, tone } => {
                let recipient = users.get_mut(&pick).filter(|_| pick != letter.sender_id);
                let outcome = match recipient {
                    Some(user) => {
                        if !user.unopened_letter_ids.contains(letter_id) {
                            user.unopened_letter_ids.push(letter_id.clone());
                        }
                        RecipientState::Routed(pick.clone())
                    }
                    None => {
                        warn!(letter_id = %letter_id, pick = %pick, "matcher pick is not a valid recipient");
                        RecipientState::RecipientNotFound
                    }
                };
                (
                    outcome,
                    RoutingInfo {
                        reason,
                        chosen_candidate: Some(pick),
                        inferred_tone: tone,
                        analysis: None,
                    },
                )
            }
        };

        letter.recipient = outcome.clone();
        letter.routing_info = RoutingInfo {
            analysis: letter.routing_info.analysis.take(),
            ..routing_info
        };

        if outcome.recipient().is_some() {
            self.save_all(&state).await;
        } else {
            self.save_letters(&state).await;
        }

        info!(letter_id = %letter_id, outcome = %outcome, "letter routed");
        Ok(outcome)
    }

    /// Peeks the oldest unopened letter, subject to the cooldown.
    pub async fn fetch_next_unopened(&self, user_id: &UserId) -> Result<NextLetter, DriftbottleError> {
        let mut state = self.lock().await;
        let now = self.now();
        let Collections { users, letters } = &mut *state;

        let user = users.get_mut(user_id).ok_or_else(|| user_not_found(user_id))?;

        if let Some(last) = user.last_letter_retrieved_at {
            match last.checked_add_signed(self.cooldown()) {
                Some(ready_at) if now < ready_at => {
                    let remaining_ms = (ready_at - now).num_milliseconds().max(1);
                    let remaining_secs = u64::try_from((remaining_ms + 999) / 1000).unwrap_or(1);
                    return Ok(NextLetter::Cooldown { remaining_secs });
                }
                Some(_) => {}
                // Past the end of representable time: never ready again.
                None => {
                    let remaining_secs =
                        u64::try_from(self.cooldown().num_seconds()).unwrap_or(u64::MAX);
                    return Ok(NextLetter::Cooldown { remaining_secs });
                }
            }
        }

        let Some(head) = user.unopened_letter_ids.first().cloned() else {
            return Ok(NextLetter::Empty);
        };

        if let Some(record) = letters.get(&head) {
            return Ok(NextLetter::Letter(LetterView::from_record(&head, record)));
        }

        user.unopened_letter_ids.remove(0);
        warn!(user_id = %user_id, letter_id = %head, "dropped stale mailbox reference");
        self.save_users(&state).await;
        Ok(NextLetter::Stale { removed: head })
    }

    /// Moves a letter from unopened to received and starts the cooldown.
    /// Opening an already received letter returns it without side effects.
    pub async fn mark_opened(
        &self,
        user_id: &UserId,
        letter_id: &LetterId,
    ) -> Result<LetterView, DriftbottleError> {
        let mut state = self.lock().await;
        let now = self.now();
        let Collections { users, letters } = &mut *state;

        let user = users.get_mut(user_id).ok_or_else(|| user_not_found(user_id))?;

        if user.received_letter_ids.contains(letter_id) {
            let record = letters.get(letter_id).ok_or_else(|| letter_not_found(letter_id))?;
            return Ok(LetterView::from_record(letter_id, record));
        }

        let Some(position) = user.unopened_letter_ids.iter().position(|id| id == letter_id) else {
            return Err(letter_not_found(letter_id));
        };

        let Some(record) = letters.get_mut(letter_id) else {
            user.unopened_letter_ids.remove(position);
            warn!(user_id = %user_id, letter_id = %letter_id, "dropped stale mailbox reference");
            self.save_users(&state).await;
            return Err(letter_not_found(letter_id));
        };

        user.unopened_letter_ids.remove(position);
        user.received_letter_ids.push(letter_id.clone());
        user.last_letter_retrieved_at = Some(now);
        if record.date_received.is_none() {
            record.date_received = Some(now);
        }
        let view = LetterView::from_record(letter_id, record);

        self.save_all(&state).await;
        info!(user_id = %user_id, letter_id = %letter_id, "letter opened");
        Ok(view)
    }

    /// Opened letters, most recently received first.
    pub async fn list_received(&self, user_id: &UserId) -> Result<Vec<LetterView>, DriftbottleError> {
        let state = self.lock().await;
        let user = state
            .users
            .get(user_id)
            .ok_or_else(|| user_not_found(user_id))?;

        let mut views: Vec<LetterView> = user
            .received_letter_ids
            .iter()
            .filter_map(|id| match state.letters.get(id) {
                Some(record) => Some(LetterView::from_record(id, record)),
                None => {
                    warn!(user_id = %user_id, letter_id = %id, "received letter missing, skipping");
                    None
                }
            })
            .collect();

        views.sort_by(|a, b| b.date_received.cmp(&a.date_received));
        Ok(views)
    }

    /// Delivery status as the sender may see it.
    pub async fn letter_status(&self, letter_id: &LetterId) -> Result<LetterStatus, DriftbottleError> {
        let state = self.lock().await;
        let record = state
            .letters
            .get(letter_id)
            .ok_or_else(|| letter_not_found(letter_id))?;
        Ok(LetterStatus {
            letter_id: letter_id.clone(),
            status: DeliveryStatus::of(record),
            date_sent: record.date_sent,
            date_received: record.date_received,
        })
    }

    /// Attaches a classifier analysis to a letter that is still pending.
    pub async fn record_analysis(
        &self,
        letter_id: &LetterId,
        analysis: Analysis,
    ) -> Result<(), DriftbottleError> {
        let mut state = self.lock().await;
        let letter = state
            .letters
            .get_mut(letter_id)
            .ok_or_else(|| letter_not_found(letter_id))?;
        if !letter.recipient.is_pending() {
            debug!(letter_id = %letter_id, "letter already routed, analysis dropped");
            return Ok(());
        }
        letter.routing_info.analysis = Some(analysis);
        self.save_letters(&state).await;
        Ok(())
    }

    /// Routing metadata, for internal callers only.
    pub async fn routing_info(&self, letter_id: &LetterId) -> Result<RoutingInfo, DriftbottleError> {
        let state = self.lock().await;
        state
            .letters
            .get(letter_id)
            .map(|record| record.routing_info.clone())
            .ok_or_else(|| letter_not_found(letter_id))
    }

    /// Raw routing state, for internal callers only.
    pub async fn recipient_state(&self, letter_id: &LetterId) -> Result<RecipientState, DriftbottleError> {
        let state = self.lock().await;
        state
            .letters
            .get(letter_id)
            .map(|record| record.recipient.clone())
            .ok_or_else(|| letter_not_found(letter_id))
    }

    /// Letters still pending or that failed to reach anyone, oldest first.
    pub async fn unresolved_letters(&self) -> Vec<UnresolvedLetter> {
        let state = self.lock().await;
        let mut unresolved: Vec<UnresolvedLetter> = state
            .letters
            .iter()
            .filter(|(_, record)| {
                matches!(
                    record.recipient,
                    RecipientState::Waiting
                        | RecipientState::WaitingForProcess
                        | RecipientState::NoSuitableRecipient
                        | RecipientState::RecipientNotFound
                )
            })
            .map(|(id, record)| UnresolvedLetter {
                letter_id: id.clone(),
                sender_id: record.sender_id.clone(),
                state: record.recipient.clone(),
                date_sent: record.date_sent,
                reason: record.routing_info.reason.clone(),
            })
            .collect();
        unresolved.sort_by(|a, b| a.date_sent.cmp(&b.date_sent));
        unresolved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use driftbottle_core::{CollectionKey, ManualClock};

    use super::*;
    use crate::persistence::MemoryCollectionStore;

    struct Fixture {
        registry: Registry,
        clock: Arc<ManualClock>,
        store: Arc<MemoryCollectionStore>,
    }

    async fn fixture(cooldown_secs: u64) -> Fixture {
        let store = Arc::new(MemoryCollectionStore::new());
        let clock = Arc::new(ManualClock::default());
        let registry = Registry::open(store.clone(), clock.clone(), cooldown_secs)
            .await
            .unwrap();
        Fixture {
            registry,
            clock,
            store,
        }
    }

    fn deliver(to: &str) -> RoutingDecision {
        RoutingDecision::Deliver {
            pick: UserId::from(to),
            reason: "test".into(),
            tone: Some(Tone::Neutral),
        }
    }

    async fn routed_letter(f: &Fixture, from: &str, to: &str, content: &str) -> LetterId {
        f.registry.ensure_user(&UserId::from(to)).await.unwrap();
        let id = f
            .registry
            .submit(&UserId::from(from), "title", content, RecipientState::Waiting)
            .await
            .unwrap();
        f.registry.apply_routing(&id, deliver(to)).await.unwrap();
        id
    }

    #[tokio::test]
    async fn submit_validates_input_without_mutating() {
        let f = fixture(60).await;
        let err = f
            .registry
            .submit(&UserId::from("a"), "t", "   ", RecipientState::Waiting)
            .await
            .unwrap_err();
        assert!(matches!(err, DriftbottleError::Validation { .. }));

        let err = f
            .registry
            .submit(&UserId::from(""), "t", "hello", RecipientState::Waiting)
            .await
            .unwrap_err();
        assert!(matches!(err, DriftbottleError::Validation { .. }));
        assert_eq!(f.registry.counts().await, (0, 0));
    }

    #[tokio::test]
    async fn submit_registers_sender_and_records_sent_id() {
        let f = fixture(60).await;
        let id = f
            .registry
            .submit(&UserId::from("a"), "t", "hello", RecipientState::WaitingForProcess)
            .await
            .unwrap();

        let sender = f.registry.user(&UserId::from("a")).await.unwrap();
        assert_eq!(sender.sent_letter_ids, vec![id.clone()]);
        let status = f.registry.letter_status(&id).await.unwrap();
        assert_eq!(status.status, DeliveryStatus::WaitingForProcess);
        assert!(f.store.raw(CollectionKey::Letters).unwrap().contains(id.as_str()));
    }

    #[tokio::test]
    async fn routing_snapshot_excludes_sender() {
        let f = fixture(60).await;
        f.registry.ensure_user(&UserId::from("b")).await.unwrap();
        let id = f
            .registry
            .submit(&UserId::from("a"), "t", "hello", RecipientState::Waiting)
            .await
            .unwrap();

        let snapshot = f.registry.routing_snapshot(&id).await.unwrap().unwrap();
        let ids: Vec<_> = snapshot.candidates.iter().map(|c| c.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn apply_routing_is_one_shot() {
        let f = fixture(60).await;
        let id = routed_letter(&f, "a", "b", "hello").await;
        f.registry.ensure_user(&UserId::from("c")).await.unwrap();

        let again = f.registry.apply_routing(&id, deliver("c")).await.unwrap();
        assert_eq!(again, RecipientState::Routed(UserId::from("b")));
        assert!(f.registry.user(&UserId::from("c")).await.unwrap().unopened_letter_ids.is_empty());
        assert!(f.registry.routing_snapshot(&id).await.unwrap().is_none());
    }

    fn late_for_nobody() -> Analysis {
        Analysis {
            emotion: "none".into(),
            topic: "none".into(),
            summary: "none".into(),
        }
    }

    #[tokio::test]
    async fn analysis_survives_routing_and_is_dropped_once_routed() {
        let f = fixture(60).await;
        f.registry.ensure_user(&UserId::from("b")).await.unwrap();
        let id = f
            .registry
            .submit(&UserId::from("a"), "t", "a walk on the beach", RecipientState::Waiting)
            .await
            .unwrap();
        let analysis = Analysis {
            emotion: "calm".into(),
            topic: "the sea".into(),
            summary: "a walk on the beach".into(),
        };

        f.registry.record_analysis(&id, analysis.clone()).await.unwrap();
        f.registry.apply_routing(&id, deliver("b")).await.unwrap();

        let info = f.registry.routing_info(&id).await.unwrap();
        assert_eq!(info.analysis, Some(analysis.clone()));
        assert_eq!(info.chosen_candidate, Some(UserId::from("b")));

        let late = Analysis {
            topic: "something else".into(),
            ..analysis.clone()
        };
        f.registry.record_analysis(&id, late).await.unwrap();
        assert_eq!(f.registry.routing_info(&id).await.unwrap().analysis, Some(analysis));

        let missing = f
            .registry
            .record_analysis(&LetterId::from("ghost"), late_for_nobody())
            .await
            .unwrap_err();
        assert!(matches!(missing, DriftbottleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn self_pick_or_unknown_pick_is_recipient_not_found() {
        let f = fixture(60).await;
        let sender = UserId::from("a");
        let first = f
            .registry
            .submit(&sender, "t", "hello", RecipientState::Waiting)
            .await
            .unwrap();
        let second = f
            .registry
            .submit(&sender, "t", "hello again", RecipientState::Waiting)
            .await
            .unwrap();

        let outcome = f.registry.apply_routing(&first, deliver("a")).await.unwrap();
        assert_eq!(outcome, RecipientState::RecipientNotFound);
        let outcome = f.registry.apply_routing(&second, deliver("nobody")).await.unwrap();
        assert_eq!(outcome, RecipientState::RecipientNotFound);

        assert!(f.registry.user(&sender).await.unwrap().unopened_letter_ids.is_empty());
        assert!(f.registry.user(&UserId::from("nobody")).await.is_none());
    }

    #[tokio::test]
    async fn reject_and_no_match_record_reason() {
        let f = fixture(60).await;
        let id = f
            .registry
            .submit(&UserId::from("a"), "t", "hello", RecipientState::Waiting)
            .await
            .unwrap();
        let outcome = f
            .registry
            .apply_routing(
                &id,
                RoutingDecision::Reject {
                    reason: "direct harm".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, RecipientState::Rejected);

        let unresolved = f.registry.unresolved_letters().await;
        assert!(unresolved.is_empty());

        let other = f
            .registry
            .submit(&UserId::from("a"), "t", "hello", RecipientState::Waiting)
            .await
            .unwrap();
        f.registry
            .apply_routing(
                &other,
                RoutingDecision::NoMatch {
                    reason: "empty pool".into(),
                    tone: None,
                },
            )
            .await
            .unwrap();
        let unresolved = f.registry.unresolved_letters().await;
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].reason, "empty pool");
    }

    #[tokio::test]
    async fn fetch_peeks_without_popping() {
        let f = fixture(60).await;
        let id = routed_letter(&f, "a", "b", "hello").await;
        let b = UserId::from("b");

        for _ in 0..2 {
            match f.registry.fetch_next_unopened(&b).await.unwrap() {
                NextLetter::Letter(view) => assert_eq!(view.letter_id, id),
                other => panic!("expected letter, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn cooldown_blocks_fetch_until_elapsed() {
        let f = fixture(100).await;
        let first = routed_letter(&f, "a", "b", "one").await;
        routed_letter(&f, "a", "b", "two").await;
        let b = UserId::from("b");

        f.registry.mark_opened(&b, &first).await.unwrap();

        f.clock.advance_secs(40);
        match f.registry.fetch_next_unopened(&b).await.unwrap() {
            NextLetter::Cooldown { remaining_secs } => assert_eq!(remaining_secs, 60),
            other => panic!("expected cooldown, got {other:?}"),
        }

        f.clock.advance_secs(60);
        assert!(matches!(
            f.registry.fetch_next_unopened(&b).await.unwrap(),
            NextLetter::Letter(_)
        ));
    }

    #[tokio::test]
    async fn oversized_cooldown_keeps_user_waiting() {
        for cooldown_secs in [10_000_000_000_000, u64::MAX] {
            let f = fixture(cooldown_secs).await;
            let first = routed_letter(&f, "a", "b", "one").await;
            routed_letter(&f, "a", "b", "two").await;
            let b = UserId::from("b");

            f.registry.mark_opened(&b, &first).await.unwrap();
            f.clock.advance_secs(86_400 * 365);

            match f.registry.fetch_next_unopened(&b).await.unwrap() {
                NextLetter::Cooldown { remaining_secs } => assert!(remaining_secs > 0),
                other => panic!("expected cooldown, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn empty_mailbox_is_empty() {
        let f = fixture(60).await;
        f.registry.ensure_user(&UserId::from("b")).await.unwrap();
        assert_eq!(
            f.registry.fetch_next_unopened(&UserId::from("b")).await.unwrap(),
            NextLetter::Empty
        );
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let f = fixture(60).await;
        let ghost = UserId::from("ghost");
        assert!(matches!(
            f.registry.fetch_next_unopened(&ghost).await.unwrap_err(),
            DriftbottleError::NotFound { kind: "user", .. }
        ));
        assert!(matches!(
            f.registry.list_received(&ghost).await.unwrap_err(),
            DriftbottleError::NotFound { .. }
        ));
        assert!(matches!(
            f.registry
                .mark_opened(&ghost, &LetterId::from("x"))
                .await
                .unwrap_err(),
            DriftbottleError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn stale_head_is_removed_and_reported() {
        let store = Arc::new(MemoryCollectionStore::new());
        store.insert_raw(
            CollectionKey::Users,
            r#"{"b": {
                "preferences": {"emotion": "unset", "custom": "unset"},
                "unopened_letter_ids": ["ghost-letter"],
                "received_letter_ids": [],
                "sent_letter_ids": [],
                "registered_at": "2026-01-01T00:00:00Z",
                "last_letter_retrieved_at": null
            }}"#,
        );
        let registry = Registry::open(store.clone(), Arc::new(ManualClock::default()), 60)
            .await
            .unwrap();
        let b = UserId::from("b");

        assert_eq!(
            registry.fetch_next_unopened(&b).await.unwrap(),
            NextLetter::Stale {
                removed: LetterId::from("ghost-letter")
            }
        );
        assert_eq!(registry.fetch_next_unopened(&b).await.unwrap(), NextLetter::Empty);
        assert!(!store.raw(CollectionKey::Users).unwrap().contains("ghost-letter"));
    }

    #[tokio::test]
    async fn mark_opened_is_idempotent() {
        let f = fixture(60).await;
        let id = routed_letter(&f, "a", "b", "hello").await;
        let b = UserId::from("b");

        let first = f.registry.mark_opened(&b, &id).await.unwrap();
        let opened_at = f.registry.user(&b).await.unwrap().last_letter_retrieved_at;

        f.clock.advance_secs(5);
        let second = f.registry.mark_opened(&b, &id).await.unwrap();
        let user = f.registry.user(&b).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(user.last_letter_retrieved_at, opened_at);
        assert_eq!(user.received_letter_ids, vec![id.clone()]);
        assert!(user.unopened_letter_ids.is_empty());
        assert_eq!(
            f.registry.letter_status(&id).await.unwrap().status,
            DeliveryStatus::Opened
        );
    }

    #[tokio::test]
    async fn mark_opened_rejects_letters_not_in_mailbox() {
        let f = fixture(60).await;
        let id = routed_letter(&f, "a", "b", "hello").await;
        let err = f
            .registry
            .mark_opened(&UserId::from("a"), &id)
            .await
            .unwrap_err();
        assert!(matches!(err, DriftbottleError::NotFound { kind: "letter", .. }));
    }

    #[tokio::test]
    async fn list_received_is_reverse_chronological() {
        let f = fixture(0).await;
        let b = UserId::from("b");
        let mut opened = Vec::new();
        for content in ["one", "two", "three"] {
            let id = routed_letter(&f, "a", "b", content).await;
            f.registry.mark_opened(&b, &id).await.unwrap();
            opened.push(id);
            f.clock.advance_secs(10);
        }

        let listed: Vec<_> = f
            .registry
            .list_received(&b)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.letter_id)
            .collect();
        opened.reverse();
        assert_eq!(listed, opened);
    }

    #[tokio::test]
    async fn views_hide_the_sender() {
        let f = fixture(60).await;
        routed_letter(&f, "secret-sender", "b", "hello").await;
        let NextLetter::Letter(view) = f.registry.fetch_next_unopened(&UserId::from("b")).await.unwrap()
        else {
            panic!("expected a letter");
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("secret-sender"));
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let f = fixture(60).await;
        let id = routed_letter(&f, "a", "b", "hello").await;

        let reopened = Registry::open(f.store.clone(), Arc::new(ManualClock::default()), 60)
            .await
            .unwrap();
        let user = reopened.user(&UserId::from("b")).await.unwrap();
        assert_eq!(user.unopened_letter_ids, vec![id.clone()]);
        assert_eq!(
            reopened.letter_status(&id).await.unwrap().status,
            DeliveryStatus::Delivered
        );
    }

    #[tokio::test]
    async fn failed_saves_do_not_fail_operations() {
        let f = fixture(60).await;
        f.store.set_fail_writes(true);
        let id = routed_letter(&f, "a", "b", "hello").await;
        let view = f.registry.mark_opened(&UserId::from("b"), &id).await.unwrap();
        assert_eq!(view.content, "hello");
    }
}

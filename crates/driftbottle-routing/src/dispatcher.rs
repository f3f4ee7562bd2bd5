// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing orchestration.
//!
//! [`LetterRouter`] runs one letter through the gate and the matcher.
//! [`Dispatcher`] decides whether that happens inside the submitting call or
//! on a background [`RoutingWorker`] fed through a bounded queue.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use driftbottle_config::RoutingMode;
use driftbottle_core::{DriftbottleError, LetterId, RecipientState, UserId};
use driftbottle_store::{DeliveryStatus, Registry, RoutingDecision};

use crate::matcher::{LetterText, RecipientMatcher};
use crate::moderation::ModerationGate;
use crate::oracle::Oracle;

/// Runs the gate and matcher for one letter and records the result.
pub struct LetterRouter {
    registry: Arc<Registry>,
    gate: ModerationGate,
    matcher: RecipientMatcher,
    analyst: Option<Arc<Oracle>>,
}

impl LetterRouter {
    pub fn new(registry: Arc<Registry>, gate: ModerationGate, matcher: RecipientMatcher) -> Self {
        Self {
            registry,
            gate,
            matcher,
            analyst: None,
        }
    }

    /// Records a classifier analysis of every letter that passes moderation.
    pub fn with_analysis(mut self, oracle: Arc<Oracle>) -> Self {
        self.analyst = Some(oracle);
        self
    }

    pub fn analyzes_letters(&self) -> bool {
        self.analyst.is_some()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn matcher_name(&self) -> &'static str {
        self.matcher.name()
    }

    pub fn moderation_uses_oracle(&self) -> bool {
        self.gate.uses_oracle()
    }

    /// Routes a pending letter. Letters already out of the pending states are
    /// left as they are and their current state is returned.
    ///
    /// The registry lock is not held while the gate or matcher run.
    pub async fn route(&self, letter_id: &LetterId) -> Result<RecipientState, DriftbottleError> {
        let Some(snapshot) = self.registry.routing_snapshot(letter_id).await? else {
            debug!(letter_id = %letter_id, "letter no longer pending");
            return self.registry.recipient_state(letter_id).await;
        };

        let verdict = self
            .gate
            .is_inappropriate(&snapshot.title, &snapshot.content)
            .await;
        if verdict.is_blocked() {
            return self
                .registry
                .apply_routing(
                    letter_id,
                    RoutingDecision::Reject {
                        reason: verdict.reason().to_string(),
                    },
                )
                .await;
        }

        let letter = LetterText {
            title: &snapshot.title,
            content: &snapshot.content,
        };
        if let Some(analyst) = &self.analyst
            && let Some(analysis) = analyst.analyze(&letter.joined()).await
        {
            info!(
                letter_id = %letter_id,
                sender = %snapshot.sender_id,
                emotion = %analysis.emotion,
                topic = %analysis.topic,
                summary = %analysis.summary,
                "letter analyzed"
            );
            self.registry.record_analysis(letter_id, analysis).await?;
        }

        let outcome = self.matcher.match_letter(letter, &snapshot.candidates).await;
        let decision = match outcome.pick {
            Some(pick) => RoutingDecision::Deliver {
                pick,
                reason: outcome.reason,
                tone: Some(outcome.tone),
            },
            None => RoutingDecision::NoMatch {
                reason: outcome.reason,
                tone: Some(outcome.tone),
            },
        };

        self.registry.apply_routing(letter_id, decision).await
    }
}

impl std::fmt::Debug for LetterRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LetterRouter")
            .field("matcher", &self.matcher.name())
            .field("moderation_oracle", &self.gate.uses_oracle())
            .field("analysis", &self.analyzes_letters())
            .finish()
    }
}

/// Response to a letter submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub letter_id: LetterId,
    /// What the sender is allowed to know. Never names the recipient.
    pub status: DeliveryStatus,
}

/// Accepts letters and hands them to routing.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: Arc<LetterRouter>,
    queue: Option<mpsc::Sender<LetterId>>,
}

impl Dispatcher {
    /// Routes inside the submitting call.
    pub fn synchronous(router: Arc<LetterRouter>) -> Self {
        Self {
            router,
            queue: None,
        }
    }

    /// Routes on a background worker. The caller must run the returned
    /// worker; letters submitted while it is not running stay
    /// `waiting_for_process`.
    pub fn deferred(router: Arc<LetterRouter>, capacity: usize) -> (Self, RoutingWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = RoutingWorker {
            router: Arc::clone(&router),
            queue: rx,
        };
        (
            Self {
                router,
                queue: Some(tx),
            },
            worker,
        )
    }

    /// Builds the dispatcher for the configured mode.
    pub fn for_mode(
        router: Arc<LetterRouter>,
        mode: RoutingMode,
        capacity: usize,
    ) -> (Self, Option<RoutingWorker>) {
        match mode {
            RoutingMode::Synchronous => (Self::synchronous(router), None),
            RoutingMode::Deferred => {
                let (dispatcher, worker) = Self::deferred(router, capacity);
                (dispatcher, Some(worker))
            }
        }
    }

    pub fn mode(&self) -> RoutingMode {
        if self.queue.is_some() {
            RoutingMode::Deferred
        } else {
            RoutingMode::Synchronous
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.router.registry()
    }

    pub fn router(&self) -> &Arc<LetterRouter> {
        &self.router
    }

    /// Stores a letter and routes it, now or later depending on the mode.
    pub async fn submit(
        &self,
        sender: &UserId,
        title: &str,
        content: &str,
    ) -> Result<Submission, DriftbottleError> {
        let registry = self.router.registry();

        let Some(queue) = &self.queue else {
            let letter_id = registry
                .submit(sender, title, content, RecipientState::Waiting)
                .await?;
            let state = self.router.route(&letter_id).await?;
            return Ok(Submission {
                status: DeliveryStatus::of_state(&state),
                letter_id,
            });
        };

        let letter_id = registry
            .submit(sender, title, content, RecipientState::WaitingForProcess)
            .await?;
        match queue.try_send(letter_id.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(id)) => {
                warn!(letter_id = %id, "routing queue is full, letter stays queued");
            }
            Err(TrySendError::Closed(id)) => {
                warn!(letter_id = %id, "routing worker is gone, letter stays queued");
            }
        }
        Ok(Submission {
            letter_id,
            status: DeliveryStatus::WaitingForProcess,
        })
    }
}

/// Drains the deferred queue, routing each letter once.
pub struct RoutingWorker {
    router: Arc<LetterRouter>,
    queue: mpsc::Receiver<LetterId>,
}

impl RoutingWorker {
    /// Runs until cancelled or until every dispatcher is dropped.
    ///
    /// A routing failure is logged and the letter is not retried.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("routing worker running");

        loop {
            tokio::select! {
                next = self.queue.recv() => {
                    let Some(letter_id) = next else {
                        debug!("routing queue closed");
                        break;
                    };
                    match self.router.route(&letter_id).await {
                        Ok(state) => debug!(letter_id = %letter_id, state = %state, "deferred routing done"),
                        Err(e) => error!(letter_id = %letter_id, error = %e, "deferred routing failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping routing worker");
                    break;
                }
            }
        }

        info!("routing worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use driftbottle_core::{ManualClock, UNSET};
    use driftbottle_store::MemoryCollectionStore;
    use driftbottle_test_utils::{MockProvider, MockReply};
    use tracing_test::traced_test;

    use super::*;

    async fn registry() -> Arc<Registry> {
        Arc::new(
            Registry::open(
                Arc::new(MemoryCollectionStore::new()),
                Arc::new(ManualClock::default()),
                60,
            )
            .await
            .unwrap(),
        )
    }

    fn heuristic_router(registry: Arc<Registry>) -> Arc<LetterRouter> {
        Arc::new(LetterRouter::new(
            registry,
            ModerationGate::lexicon_only(),
            RecipientMatcher::Heuristic,
        ))
    }

    #[tokio::test]
    async fn unset_recipient_receives_letter() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("A")).await.unwrap();
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let dispatcher = Dispatcher::synchronous(heuristic_router(Arc::clone(&registry)));

        let submission = dispatcher
            .submit(&UserId::from("A"), "hi", "a quiet evening by the sea")
            .await
            .unwrap();
        assert_eq!(submission.status, DeliveryStatus::Delivered);

        let b = registry.user(&UserId::from("B")).await.unwrap();
        assert_eq!(b.unopened_letter_ids, vec![submission.letter_id.clone()]);
        assert_eq!(b.preferences.custom, UNSET);
        let a = registry.user(&UserId::from("A")).await.unwrap();
        assert_eq!(a.sent_letter_ids, vec![submission.letter_id]);
    }

    #[tokio::test]
    async fn death_threat_is_rejected() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let dispatcher = Dispatcher::synchronous(heuristic_router(Arc::clone(&registry)));

        let submission = dispatcher
            .submit(&UserId::from("A"), "", "お前なんか死ね")
            .await
            .unwrap();
        assert_eq!(submission.status, DeliveryStatus::Rejected);
        let b = registry.user(&UserId::from("B")).await.unwrap();
        assert!(b.unopened_letter_ids.is_empty());
    }

    #[tokio::test]
    async fn lone_sender_gets_no_recipient() {
        let registry = registry().await;
        let dispatcher = Dispatcher::synchronous(heuristic_router(Arc::clone(&registry)));

        let submission = dispatcher
            .submit(&UserId::from("A"), "", "is anyone out there?")
            .await
            .unwrap();
        assert_eq!(submission.status, DeliveryStatus::NoSuitableRecipient);
    }

    #[tokio::test]
    async fn invented_oracle_pick_is_recipient_not_found() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let provider = MockProvider::with_replies(vec![MockReply::Text(
            r#"{"recipient": "ghost", "reason": "sounds nice"}"#.into(),
        )]);
        let oracle = Arc::new(Oracle::new(Arc::new(provider), "test-model", 64));
        let router = Arc::new(LetterRouter::new(
            Arc::clone(&registry),
            ModerationGate::lexicon_only(),
            RecipientMatcher::Oracle(oracle),
        ));

        let submission = Dispatcher::synchronous(router)
            .submit(&UserId::from("A"), "", "hello")
            .await
            .unwrap();
        assert_eq!(submission.status, DeliveryStatus::RecipientNotFound);
    }

    #[tokio::test]
    #[traced_test]
    async fn analysis_is_recorded_and_never_blocks_routing() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let provider = MockProvider::with_replies(vec![
            MockReply::Text(
                r#"{"emotion": "wistful", "topic": "the sea", "summary": "Missing the coast."}"#.into(),
            ),
            MockReply::Failure("connection reset".into()),
        ]);
        let oracle = Arc::new(Oracle::new(Arc::new(provider.clone()), "test-model", 64));
        let router = Arc::new(
            LetterRouter::new(
                Arc::clone(&registry),
                ModerationGate::lexicon_only(),
                RecipientMatcher::Heuristic,
            )
            .with_analysis(oracle),
        );
        let dispatcher = Dispatcher::synchronous(router);

        let first = dispatcher
            .submit(&UserId::from("A"), "shore", "I think about the coast every day")
            .await
            .unwrap();
        assert_eq!(first.status, DeliveryStatus::Delivered);
        let info = registry.routing_info(&first.letter_id).await.unwrap();
        let analysis = info.analysis.unwrap();
        assert_eq!(analysis.emotion, "wistful");
        assert_eq!(analysis.topic, "the sea");
        assert!(logs_contain("letter analyzed"));

        let second = dispatcher
            .submit(&UserId::from("A"), "", "hello again")
            .await
            .unwrap();
        assert_eq!(second.status, DeliveryStatus::Delivered);
        let info = registry.routing_info(&second.letter_id).await.unwrap();
        assert!(info.analysis.is_none());
        assert_eq!(provider.prompts().await.len(), 2);
    }

    #[tokio::test]
    async fn rejected_letters_are_not_analyzed() {
        let registry = registry().await;
        let provider = MockProvider::new();
        let oracle = Arc::new(Oracle::new(Arc::new(provider.clone()), "test-model", 64));
        let router = Arc::new(
            LetterRouter::new(
                Arc::clone(&registry),
                ModerationGate::lexicon_only(),
                RecipientMatcher::Heuristic,
            )
            .with_analysis(oracle),
        );

        let submission = Dispatcher::synchronous(router)
            .submit(&UserId::from("A"), "", "お前なんか死ね")
            .await
            .unwrap();
        assert_eq!(submission.status, DeliveryStatus::Rejected);
        assert!(provider.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn routing_twice_leaves_letter_untouched() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let router = heuristic_router(Arc::clone(&registry));
        let submission = Dispatcher::synchronous(Arc::clone(&router))
            .submit(&UserId::from("A"), "", "hello")
            .await
            .unwrap();

        let again = router.route(&submission.letter_id).await.unwrap();
        assert_eq!(again, RecipientState::Routed(UserId::from("B")));
        let b = registry.user(&UserId::from("B")).await.unwrap();
        assert_eq!(b.unopened_letter_ids.len(), 1);
    }

    #[tokio::test]
    async fn deferred_letter_waits_for_worker() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let (dispatcher, worker) = Dispatcher::deferred(heuristic_router(Arc::clone(&registry)), 4);
        assert_eq!(dispatcher.mode(), RoutingMode::Deferred);

        let submission = dispatcher
            .submit(&UserId::from("A"), "", "hello from afar")
            .await
            .unwrap();
        assert_eq!(submission.status, DeliveryStatus::WaitingForProcess);
        assert_eq!(
            registry.recipient_state(&submission.letter_id).await.unwrap(),
            RecipientState::WaitingForProcess
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        let mut routed = false;
        for _ in 0..200 {
            if !registry
                .recipient_state(&submission.letter_id)
                .await
                .unwrap()
                .is_pending()
            {
                routed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(routed);
        assert_eq!(
            registry.recipient_state(&submission.letter_id).await.unwrap(),
            RecipientState::Routed(UserId::from("B"))
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn letter_stays_waiting_when_worker_never_runs() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let (dispatcher, worker) = Dispatcher::deferred(heuristic_router(Arc::clone(&registry)), 4);
        drop(worker);

        let submission = dispatcher
            .submit(&UserId::from("A"), "", "hello")
            .await
            .unwrap();
        assert_eq!(submission.status, DeliveryStatus::WaitingForProcess);
        assert_eq!(
            registry.recipient_state(&submission.letter_id).await.unwrap(),
            RecipientState::WaitingForProcess
        );
        let pending = registry.unresolved_letters().await;
        assert_eq!(pending.len(), 1);
        assert!(logs_contain("routing worker is gone"));
    }

    #[tokio::test]
    #[traced_test]
    async fn full_queue_does_not_hold_up_submit() {
        let registry = registry().await;
        registry.ensure_user(&UserId::from("B")).await.unwrap();
        let (dispatcher, _worker) = Dispatcher::deferred(heuristic_router(Arc::clone(&registry)), 1);

        for content in ["first bottle", "second bottle"] {
            let submission = tokio::time::timeout(
                Duration::from_millis(500),
                dispatcher.submit(&UserId::from("A"), "", content),
            )
            .await
            .expect("submit returned")
            .unwrap();
            assert_eq!(submission.status, DeliveryStatus::WaitingForProcess);
        }

        assert_eq!(registry.unresolved_letters().await.len(), 2);
        assert!(logs_contain("routing queue is full"));
    }

    #[tokio::test]
    async fn worker_stops_when_dispatcher_dropped() {
        let registry = registry().await;
        let (dispatcher, worker) = Dispatcher::deferred(heuristic_router(registry), 1);
        drop(dispatcher);
        worker.run(CancellationToken::new()).await;
    }

    #[tokio::test]
    async fn empty_content_is_refused_before_storage() {
        let registry = registry().await;
        let dispatcher = Dispatcher::synchronous(heuristic_router(Arc::clone(&registry)));
        let err = dispatcher
            .submit(&UserId::from("A"), "title", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, DriftbottleError::Validation { .. }));
        assert_eq!(registry.counts().await, (0, 0));
    }
}

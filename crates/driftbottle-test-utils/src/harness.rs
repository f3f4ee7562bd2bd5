// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `TestHarness` assembles a registry over an in-memory (or temp-dir JSON)
//! store, a [`ManualClock`], a [`MockProvider`], and a dispatcher built from
//! the same configuration the binary uses.

use std::sync::Arc;

use driftbottle_config::{DriftbottleConfig, MatcherKind, RoutingMode};
use driftbottle_core::{
    CollectionStore, DriftbottleError, ManualClock, Preferences, ProviderAdapter, UserId,
};
use driftbottle_routing::{Dispatcher, RoutingWorker, Submission, build_router};
use driftbottle_store::{JsonFileStore, MemoryCollectionStore, Registry};

use crate::mock_provider::{MockProvider, MockReply};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: DriftbottleConfig,
    replies: Vec<MockReply>,
    with_provider: bool,
    on_disk: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = DriftbottleConfig::default();
        config.mailbox.cooldown_secs = 60;
        config.routing.moderation_oracle = false;
        Self {
            config,
            replies: Vec::new(),
            with_provider: false,
            on_disk: false,
        }
    }

    /// Set the mailbox cooldown.
    pub fn with_cooldown_secs(mut self, secs: u64) -> Self {
        self.config.mailbox.cooldown_secs = secs;
        self
    }

    /// Route on a background worker instead of inline.
    pub fn deferred(mut self, capacity: usize) -> Self {
        self.config.routing.mode = RoutingMode::Deferred;
        self.config.routing.queue_capacity = capacity;
        self
    }

    /// Let the classifier pick recipients.
    pub fn with_oracle_matcher(mut self) -> Self {
        self.config.routing.matcher = MatcherKind::Oracle;
        self.with_provider = true;
        self
    }

    /// Ask the classifier during moderation.
    pub fn with_moderation_oracle(mut self) -> Self {
        self.config.routing.moderation_oracle = true;
        self.with_provider = true;
        self
    }

    /// Ask the classifier to analyze each letter that passes moderation.
    pub fn with_analysis(mut self) -> Self {
        self.config.routing.analysis = true;
        self.with_provider = true;
        self
    }

    /// Scripted classifier replies, consumed in order.
    pub fn with_mock_replies(mut self, replies: Vec<MockReply>) -> Self {
        self.replies = replies;
        self.with_provider = true;
        self
    }

    /// Persist to JSON files in a temp directory.
    pub fn on_disk(mut self) -> Self {
        self.on_disk = true;
        self
    }

    /// Build the test harness.
    pub async fn build(self) -> Result<TestHarness, DriftbottleError> {
        let temp_dir = if self.on_disk {
            Some(tempfile::TempDir::new().map_err(|e| DriftbottleError::Storage { source: e.into() })?)
        } else {
            None
        };
        let store: Arc<dyn CollectionStore> = match &temp_dir {
            Some(dir) => Arc::new(JsonFileStore::new(dir.path())),
            None => Arc::new(MemoryCollectionStore::new()),
        };

        let clock = Arc::new(ManualClock::default());
        let registry = Arc::new(
            Registry::open(store, clock.clone(), self.config.mailbox.cooldown_secs).await?,
        );

        let mock_provider = Arc::new(MockProvider::with_replies(self.replies));
        let provider = self
            .with_provider
            .then(|| Arc::clone(&mock_provider) as Arc<dyn ProviderAdapter>);

        let router = Arc::new(build_router(&self.config, Arc::clone(&registry), provider));
        let (dispatcher, worker) = Dispatcher::for_mode(
            router,
            self.config.routing.mode,
            self.config.routing.queue_capacity,
        );

        Ok(TestHarness {
            registry,
            clock,
            mock_provider,
            dispatcher,
            worker,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete routing environment with a mock classifier.
pub struct TestHarness {
    pub registry: Arc<Registry>,
    pub clock: Arc<ManualClock>,
    /// Only wired in when the builder asked for a classifier.
    pub mock_provider: Arc<MockProvider>,
    pub dispatcher: Dispatcher,
    /// Present in deferred mode until taken.
    pub worker: Option<RoutingWorker>,
    pub config: DriftbottleConfig,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Registers every id with default preferences.
    pub async fn register(&self, ids: &[&str]) -> Result<(), DriftbottleError> {
        for id in ids {
            self.registry.ensure_user(&UserId::from(*id)).await?;
        }
        Ok(())
    }

    /// Registers a user and sets both preference fields.
    pub async fn register_with(
        &self,
        id: &str,
        emotion: &str,
        custom: &str,
    ) -> Result<Preferences, DriftbottleError> {
        let user = UserId::from(id);
        self.registry.ensure_user(&user).await?;
        self.registry
            .update_preferences(&user, emotion, custom)
            .await
    }

    /// Submits a letter through the dispatcher.
    pub async fn send_letter(
        &self,
        sender: &str,
        title: &str,
        content: &str,
    ) -> Result<Submission, DriftbottleError> {
        self.dispatcher
            .submit(&UserId::from(sender), title, content)
            .await
    }

    /// Moves the clock forward.
    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance_secs(secs);
    }

    /// Takes the deferred worker so the test decides when it runs.
    pub fn take_worker(&mut self) -> Option<RoutingWorker> {
        self.worker.take()
    }
}

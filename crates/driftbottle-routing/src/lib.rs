// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation, recipient matching, and routing dispatch.
//!
//! A submitted letter passes through the [`ModerationGate`], then the
//! [`RecipientMatcher`] picks a candidate, and the [`Dispatcher`] records the
//! decision either inline or from a background [`RoutingWorker`].

pub mod dispatcher;
pub mod matcher;
pub mod moderation;
pub mod oracle;
pub mod tone;

use std::sync::Arc;

use tracing::{info, warn};

use driftbottle_config::{DriftbottleConfig, MatcherKind};
use driftbottle_core::ProviderAdapter;
use driftbottle_store::Registry;

pub use dispatcher::{Dispatcher, LetterRouter, RoutingWorker, Submission};
pub use matcher::{LetterText, MatchOutcome, RecipientMatcher};
pub use moderation::{ModerationGate, ModerationVerdict};
pub use oracle::{ModerationAnswer, Oracle, OracleVerdict};

/// Builds the router the configuration asks for.
///
/// Without a provider, the gate runs on the lexicon alone, an `oracle`
/// matcher falls back to heuristics, and letter analysis is skipped.
pub fn build_router(
    config: &DriftbottleConfig,
    registry: Arc<Registry>,
    provider: Option<Arc<dyn ProviderAdapter>>,
) -> LetterRouter {
    let oracle = provider.map(|provider| {
        Arc::new(Oracle::new(
            provider,
            config.anthropic.model.clone(),
            config.anthropic.max_tokens,
        ))
    });

    let gate = match &oracle {
        Some(oracle) if config.routing.moderation_oracle => ModerationGate::with_oracle(Arc::clone(oracle)),
        _ => ModerationGate::lexicon_only(),
    };

    let analyst = match (config.routing.analysis, &oracle) {
        (true, Some(oracle)) => Some(Arc::clone(oracle)),
        (true, None) => {
            warn!("letter analysis configured without a classifier, skipping it");
            None
        }
        (false, _) => None,
    };

    let matcher = match (config.routing.matcher, oracle) {
        (MatcherKind::Oracle, Some(oracle)) => RecipientMatcher::Oracle(oracle),
        (MatcherKind::Oracle, None) => {
            warn!("oracle matcher configured without a classifier, using heuristics");
            RecipientMatcher::Heuristic
        }
        (MatcherKind::Heuristic, _) => RecipientMatcher::Heuristic,
    };

    let mut router = LetterRouter::new(registry, gate, matcher);
    if let Some(analyst) = analyst {
        router = router.with_analysis(analyst);
    }
    info!(
        matcher = router.matcher_name(),
        moderation_oracle = router.moderation_uses_oracle(),
        analysis = router.analyzes_letters(),
        "router configured"
    );
    router
}

#[cfg(test)]
mod tests {
    use driftbottle_core::ManualClock;
    use driftbottle_store::MemoryCollectionStore;
    use driftbottle_test_utils::MockProvider;

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

    #[tokio::test]
    async fn oracle_matcher_without_provider_downgrades() {
        let mut config = DriftbottleConfig::default();
        config.routing.matcher = MatcherKind::Oracle;
        let router = build_router(&config, registry().await, None);
        assert_eq!(router.matcher_name(), "heuristic");
        assert!(!router.moderation_uses_oracle());
    }

    #[tokio::test]
    async fn provider_enables_oracle_stages() {
        let mut config = DriftbottleConfig::default();
        config.routing.matcher = MatcherKind::Oracle;
        let provider: Arc<dyn ProviderAdapter> = Arc::new(MockProvider::new());
        let router = build_router(&config, registry().await, Some(provider));
        assert_eq!(router.matcher_name(), "oracle");
        assert!(router.moderation_uses_oracle());
        assert!(!router.analyzes_letters());
    }

    #[tokio::test]
    async fn analysis_needs_a_provider() {
        let mut config = DriftbottleConfig::default();
        config.routing.analysis = true;
        assert!(!build_router(&config, registry().await, None).analyzes_letters());

        let provider: Arc<dyn ProviderAdapter> = Arc::new(MockProvider::new());
        let router = build_router(&config, registry().await, Some(provider));
        assert!(router.analyzes_letters());
        assert_eq!(router.matcher_name(), "heuristic");
    }

    #[tokio::test]
    async fn moderation_oracle_can_be_switched_off() {
        let mut config = DriftbottleConfig::default();
        config.routing.moderation_oracle = false;
        let provider: Arc<dyn ProviderAdapter> = Arc::new(MockProvider::new());
        let router = build_router(&config, registry().await, Some(provider));
        assert_eq!(router.matcher_name(), "heuristic");
        assert!(!router.moderation_uses_oracle());
    }
}

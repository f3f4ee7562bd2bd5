// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `driftbottle serve` command implementation.
//!
//! Opens the registry, wires the classifier (when a key is available), the
//! moderation gate, the matcher, and the dispatcher, then serves the HTTP
//! gateway until a shutdown signal arrives.

use std::sync::Arc;

use driftbottle_config::DriftbottleConfig;
use driftbottle_config::model::ServiceConfig;
use driftbottle_core::{CollectionStore, DriftbottleError, ProviderAdapter, SystemClock};
use driftbottle_gateway::{GatewayState, ServerConfig, start_server};
use driftbottle_routing::{Dispatcher, build_router};
use driftbottle_store::{JsonFileStore, MemoryCollectionStore, Registry};
use tracing::{error, info, warn};

use crate::shutdown;

/// Opens the registry over the configured store.
pub async fn open_registry(
    config: &DriftbottleConfig,
    ephemeral: bool,
) -> Result<Arc<Registry>, DriftbottleError> {
    let store: Arc<dyn CollectionStore> = if ephemeral {
        warn!("ephemeral mode, state is lost on exit");
        Arc::new(MemoryCollectionStore::new())
    } else {
        Arc::new(JsonFileStore::from_config(&config.storage))
    };
    let registry = Registry::open(store, Arc::new(SystemClock), config.mailbox.cooldown_secs).await?;
    Ok(Arc::new(registry))
}

#[cfg(feature = "anthropic")]
fn init_provider(config: &DriftbottleConfig) -> Result<Option<Arc<dyn ProviderAdapter>>, DriftbottleError> {
    let provider = driftbottle_anthropic::AnthropicProvider::from_config(&config.anthropic)?;
    Ok(provider.map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>))
}

#[cfg(not(feature = "anthropic"))]
fn init_provider(_config: &DriftbottleConfig) -> Result<Option<Arc<dyn ProviderAdapter>>, DriftbottleError> {
    info!("built without a classifier, heuristics only");
    Ok(None)
}

pub async fn run_serve(config: DriftbottleConfig, ephemeral: bool) -> Result<(), DriftbottleError> {
    init_tracing(&config.service)?;

    info!(name = config.service.name, "starting driftbottle serve");

    let registry = open_registry(&config, ephemeral).await?;
    let provider = init_provider(&config)?;
    let router = Arc::new(build_router(&config, Arc::clone(&registry), provider));
    let (dispatcher, worker) = Dispatcher::for_mode(
        router,
        config.routing.mode,
        config.routing.queue_capacity,
    );
    info!(mode = %dispatcher.mode(), "dispatcher ready");

    let cancel = shutdown::install_signal_handler();

    let worker_handle = worker.map(|worker| tokio::spawn(worker.run(cancel.clone())));

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    let served = start_server(&server_config, GatewayState::new(dispatcher), cancel.clone()).await;

    cancel.cancel();
    if let Some(handle) = worker_handle
        && let Err(e) = handle.await
    {
        error!(error = %e, "routing worker panicked");
    }

    let pending = registry.unresolved_letters().await;
    let (users, letters) = registry.counts().await;
    if let Err(e) = registry.shutdown().await {
        error!(error = %e, "store shutdown failed");
    }
    info!(users, letters, unresolved = pending.len(), "driftbottle stopped");
    served
}

/// Initializes the tracing subscriber, optionally teeing to a log file.
fn init_tracing(service: &ServiceConfig) -> Result<(), DriftbottleError> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("driftbottle={},warn", service.log_level)));

    let file_layer = match &service.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| DriftbottleError::Config(format!("cannot open log file {path}: {e}")))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();
    Ok(())
}

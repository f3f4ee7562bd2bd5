// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use driftbottle_core::DriftbottleError;
use driftbottle_routing::Dispatcher;
use driftbottle_store::Registry;

use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Accepts letters and routes them.
    pub dispatcher: Dispatcher,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.dispatcher.registry()
    }
}

/// Gateway server configuration (mirrors `GatewayConfig` from driftbottle-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Builds the application router.
pub fn build_router(state: GatewayState) -> Router {
    let api_routes = Router::new()
        .route("/v1/users/{user_id}", post(handlers::post_user))
        .route(
            "/v1/users/{user_id}/preferences",
            put(handlers::put_preferences),
        )
        .route("/v1/users/{user_id}/letters/next", get(handlers::get_next_letter))
        .route(
            "/v1/users/{user_id}/letters/received",
            get(handlers::get_received_letters),
        )
        .route(
            "/v1/users/{user_id}/letters/{letter_id}/open",
            post(handlers::post_open_letter),
        )
        .route("/v1/letters", post(handlers::post_letter))
        .route("/v1/letters/{letter_id}", get(handlers::get_letter_status));

    Router::new()
        .route("/health", get(handlers::get_health))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the gateway HTTP server and serve until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), DriftbottleError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DriftbottleError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| DriftbottleError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

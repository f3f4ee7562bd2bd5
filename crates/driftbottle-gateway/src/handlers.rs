// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use driftbottle_core::{DriftbottleError, HealthStatus, LetterId, LetterView, Preferences, UserId};
use driftbottle_store::{DeliveryStatus, LetterStatus, NextLetter};

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A [`DriftbottleError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DriftbottleError);

impl From<DriftbottleError> for ApiError {
    fn from(err: DriftbottleError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DriftbottleError::Validation { .. } => StatusCode::BAD_REQUEST,
            DriftbottleError::NotFound { .. } => StatusCode::NOT_FOUND,
            other => {
                error!(error = %other, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", "degraded", or "unhealthy".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub version: String,
    pub uptime_secs: u64,
    pub store: String,
    pub routing_mode: String,
    pub matcher: String,
    pub users: usize,
    pub letters: usize,
}

/// Response body for POST /v1/users/{user_id}.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: UserId,
    /// True when this call created the user.
    pub registered: bool,
    pub preferences: Preferences,
}

/// Request body for PUT /v1/users/{user_id}/preferences.
#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    pub emotion: String,
    pub custom: String,
}

/// Request body for POST /v1/letters.
///
/// Every field defaults to empty so a missing sender or body is reported
/// by submission validation as a 400.
#[derive(Debug, Deserialize)]
pub struct LetterRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Response body for POST /v1/letters.
#[derive(Debug, Serialize)]
pub struct LetterResponse {
    pub letter_id: LetterId,
    pub status: DeliveryStatus,
}

/// Response body for GET /v1/users/{user_id}/letters/received.
#[derive(Debug, Serialize)]
pub struct ReceivedResponse {
    pub letters: Vec<LetterView>,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let registry = state.registry();
    let (status, detail) = match registry.health().await {
        Ok(HealthStatus::Healthy) => ("ok", None),
        Ok(HealthStatus::Degraded(detail)) => ("degraded", Some(detail)),
        Ok(HealthStatus::Unhealthy(detail)) => ("unhealthy", Some(detail)),
        Err(e) => ("unhealthy", Some(e.to_string())),
    };
    let (users, letters) = registry.counts().await;

    let code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let body = HealthResponse {
        status: status.to_string(),
        detail,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        store: registry.store_name().to_string(),
        routing_mode: state.dispatcher.mode().to_string(),
        matcher: state.dispatcher.router().matcher_name().to_string(),
        users,
        letters,
    };
    (code, Json(body)).into_response()
}

/// POST /v1/users/{user_id}
///
/// Registers the user if unknown. 201 on creation, 200 otherwise.
pub async fn post_user(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let user_id = UserId(user_id);
    let (registered, record) = state.registry().ensure_user(&user_id).await?;
    let code = if registered {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = UserResponse {
        user_id,
        registered,
        preferences: record.preferences,
    };
    Ok((code, Json(body)).into_response())
}

/// PUT /v1/users/{user_id}/preferences
pub async fn put_preferences(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
    Json(body): Json<PreferencesRequest>,
) -> ApiResult<Json<Preferences>> {
    let preferences = state
        .registry()
        .update_preferences(&UserId(user_id), &body.emotion, &body.custom)
        .await?;
    Ok(Json(preferences))
}

/// POST /v1/letters
///
/// 201 once routing has finished, 202 while a background worker owns it.
pub async fn post_letter(
    State(state): State<GatewayState>,
    Json(body): Json<LetterRequest>,
) -> ApiResult<Response> {
    let submission = state
        .dispatcher
        .submit(&UserId(body.user_id), &body.title, &body.content)
        .await?;
    let code = match submission.status {
        DeliveryStatus::Waiting | DeliveryStatus::WaitingForProcess => StatusCode::ACCEPTED,
        _ => StatusCode::CREATED,
    };
    let body = LetterResponse {
        letter_id: submission.letter_id,
        status: submission.status,
    };
    Ok((code, Json(body)).into_response())
}

/// GET /v1/letters/{letter_id}
pub async fn get_letter_status(
    State(state): State<GatewayState>,
    Path(letter_id): Path<String>,
) -> ApiResult<Json<LetterStatus>> {
    let status = state.registry().letter_status(&LetterId(letter_id)).await?;
    Ok(Json(status))
}

/// GET /v1/users/{user_id}/letters/next
pub async fn get_next_letter(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<NextLetter>> {
    let next = state
        .registry()
        .fetch_next_unopened(&UserId(user_id))
        .await?;
    Ok(Json(next))
}

/// POST /v1/users/{user_id}/letters/{letter_id}/open
pub async fn post_open_letter(
    State(state): State<GatewayState>,
    Path((user_id, letter_id)): Path<(String, String)>,
) -> ApiResult<Json<LetterView>> {
    let view = state
        .registry()
        .mark_opened(&UserId(user_id), &LetterId(letter_id))
        .await?;
    Ok(Json(view))
}

/// GET /v1/users/{user_id}/letters/received
pub async fn get_received_letters(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ReceivedResponse>> {
    let letters = state.registry().list_received(&UserId(user_id)).await?;
    Ok(Json(ReceivedResponse { letters }))
}

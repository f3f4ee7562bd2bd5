// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Driftbottle relay.
//!
//! Exposes user registration, preferences, letter submission, and the
//! recipient mailbox as a JSON API over axum.

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, ErrorResponse};
pub use server::{GatewayState, ServerConfig, build_router, start_server};

// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for the text classification oracle.

use async_trait::async_trait;

use crate::error::DriftbottleError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for an LLM used as a stateless text-in/text-out classifier.
///
/// A provider may fail outright (transport or API error, returned as `Err`)
/// or decline to answer because its own safety layer flagged the input
/// (returned as `Ok` with [`ProviderResponse::is_refusal`]).
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest)
        -> Result<ProviderResponse, DriftbottleError>;
}

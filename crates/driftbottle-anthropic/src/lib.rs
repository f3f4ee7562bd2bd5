// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic classifier for the Driftbottle relay.
//!
//! Implements [`ProviderAdapter`] over the non-streaming Anthropic Messages
//! API. Moderation and matching prompts are single-turn and stateless, so
//! there is no conversation or streaming support.

pub mod client;
pub mod types;

use async_trait::async_trait;
use driftbottle_config::model::AnthropicConfig;
use driftbottle_core::error::DriftbottleError;
use driftbottle_core::traits::{PluginAdapter, ProviderAdapter};
use driftbottle_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage,
};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Anthropic provider implementing [`ProviderAdapter`].
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    /// Creates a provider from the `[anthropic]` config section.
    ///
    /// API key resolution order: `anthropic.api_key`, then `ANTHROPIC_API_KEY`.
    /// Returns `Ok(None)` when neither is set so the relay can run without a
    /// classifier.
    pub fn from_config(config: &AnthropicConfig) -> Result<Option<Self>, DriftbottleError> {
        let Some(api_key) = resolve_api_key(config.api_key.as_deref()) else {
            info!("no Anthropic API key configured, classifier disabled");
            return Ok(None);
        };

        let client = AnthropicClient::new(&api_key, &config.api_version)?;
        info!(model = config.model, "Anthropic classifier initialized");
        Ok(Some(Self { client }))
    }

    #[cfg(test)]
    fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }

    fn to_message_request(request: &ProviderRequest) -> MessageRequest {
        MessageRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            system: request.system_prompt.clone(),
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, DriftbottleError> {
        // No API call: health checks should not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DriftbottleError> {
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, DriftbottleError> {
        let api_request = Self::to_message_request(&request);
        let response = self.client.complete_message(&api_request).await?;

        Ok(ProviderResponse {
            content: response.text(),
            id: response.id,
            model: response.model,
            stop_reason: response.stop_reason,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}

/// Resolves the API key from config, falling back to `ANTHROPIC_API_KEY`.
fn resolve_api_key(config_key: Option<&str>) -> Option<String> {
    if let Some(key) = config_key
        && !key.trim().is_empty()
    {
        return Some(key.to_string());
    }

    std::env::var("ANTHROPIC_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
}

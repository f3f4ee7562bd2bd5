// SPDX-FileCopyrightText: 2026 Driftbottle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification round trips against the Anthropic Messages API.
//!
//! Every call is one short, non-streaming completion. A transient failure
//! (429, 500, 503, 529) is retried once, waiting for `retry-after` when the
//! API sends one.

use std::time::Duration;

use driftbottle_core::DriftbottleError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Upper bound on a single classification round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest `retry-after` honoured before giving up on the retry.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Error bodies are cut to this many characters in messages and logs.
const BODY_EXCERPT_CHARS: usize = 200;

/// HTTP client for Anthropic API communication.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    retry_delay: Duration,
}

/// What one HTTP attempt produced.
enum Attempt {
    Answered(MessageResponse),
    /// Worth one more try after the given pause.
    Transient { error: DriftbottleError, wait: Duration },
    Failed(DriftbottleError),
}

impl AnthropicClient {
    /// Creates a client with the key and API version as default headers.
    pub fn new(api_key: &str, api_version: &str) -> Result<Self, DriftbottleError> {
        let header = |name: &str, value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| DriftbottleError::Config(format!("invalid {name} header value: {e}")))
        };
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", header("x-api-key", api_key)?);
        headers.insert("anthropic-version", header("anthropic-version", api_version)?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| DriftbottleError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: API_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            retry_delay: Duration::from_secs(1),
        })
    }

    #[cfg(test)]
    pub(crate) fn against(mut self, endpoint: String, timeout: Duration) -> Self {
        self.endpoint = endpoint;
        self.timeout = timeout;
        self.retry_delay = Duration::from_millis(10);
        self
    }

    /// Sends one classification request, retrying a transient failure once.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, DriftbottleError> {
        match self.attempt(request).await {
            Attempt::Answered(response) => Ok(response),
            Attempt::Failed(error) => Err(error),
            Attempt::Transient { error, wait } => {
                warn!(error = %error, wait_ms = wait.as_millis() as u64, "retrying classification request");
                tokio::time::sleep(wait).await;
                match self.attempt(request).await {
                    Attempt::Answered(response) => Ok(response),
                    Attempt::Failed(error) | Attempt::Transient { error, .. } => Err(error),
                }
            }
        }
    }

    async fn attempt(&self, request: &MessageRequest) -> Attempt {
        let sent = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Failed(DriftbottleError::Timeout {
                    duration: self.timeout,
                });
            }
            Err(e) => {
                return Attempt::Failed(DriftbottleError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                });
            }
        };

        let status = response.status();
        debug!(status = %status, "classification response received");
        let wait = retry_after(response.headers()).unwrap_or(self.retry_delay);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Attempt::Failed(DriftbottleError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                });
            }
        };

        if status.is_success() {
            return match serde_json::from_str(&body) {
                Ok(response) => Attempt::Answered(response),
                Err(e) => Attempt::Failed(DriftbottleError::Provider {
                    message: format!(
                        "unexpected response body ({e}): {}",
                        excerpt(&body)
                    ),
                    source: Some(Box::new(e)),
                }),
            };
        }

        let error = DriftbottleError::Provider {
            message: describe_failure(status, &body),
            source: None,
        };
        if is_transient_error(status) && wait <= MAX_RETRY_AFTER {
            Attempt::Transient { error, wait }
        } else {
            Attempt::Failed(error)
        }
    }
}

/// Delay requested by a `retry-after: <seconds>` header.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn excerpt(body: &str) -> String {
    let mut cut: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    if cut.len() < body.len() {
        cut.push('…');
    }
    cut
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Anthropic API error {status} ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {}", excerpt(body)),
    }
}

fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiMessage;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new("test-api-key", "2023-06-01")
            .unwrap()
            .against(server.uri(), Duration::from_secs(5))
    }

    fn moderation_request() -> MessageRequest {
        MessageRequest {
            model: "claude-haiku-4-5-20251001".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "Is this letter inappropriate? yes or no".into(),
            }],
            system: None,
            max_tokens: 16,
            stream: false,
        }
    }

    fn answer(id: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-haiku-4-5-20251001",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 1}
        })
    }

    fn api_error(kind: &str, message: &str) -> serde_json::Value {
        serde_json::json!({"error": {"type": kind, "message": message}})
    }

    #[tokio::test]
    async fn answer_carries_text_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("msg_1", "no")))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .complete_message(&moderation_request())
            .await
            .unwrap();
        assert_eq!(response.id, "msg_1");
        assert_eq!(response.text(), "no");
        assert_eq!(response.usage.input_tokens, 12);
    }

    #[tokio::test]
    async fn overloaded_api_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(529).set_body_json(api_error("overloaded_error", "Overloaded")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("msg_2", "yes")))
            .mount(&server)
            .await;

        let response = client_for(&server)
            .complete_message(&moderation_request())
            .await
            .unwrap();
        assert_eq!(response.text(), "yes");
    }

    #[tokio::test]
    async fn second_transient_failure_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(api_error("api_error", "Unavailable")),
            )
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_message(&moderation_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("api_error"), "got: {err}");
    }

    #[tokio::test]
    async fn long_retry_after_is_not_waited_for() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3600")
                    .set_body_json(api_error("rate_limit_error", "Rate limited")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_message(&moderation_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("rate_limit_error"), "got: {err}");
    }

    #[tokio::test]
    async fn bad_request_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(api_error("invalid_request_error", "Bad model")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_message(&moderation_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn slow_api_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(answer("msg_slow", "no"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = AnthropicClient::new("test-api-key", "2023-06-01")
            .unwrap()
            .against(server.uri(), Duration::from_millis(50));
        let err = client.complete_message(&moderation_request()).await.unwrap_err();
        assert!(matches!(err, DriftbottleError::Timeout { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn html_error_page_is_cut_short() {
        let server = MockServer::start().await;
        let page = format!("<html>{}</html>", "x".repeat(1000));
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete_message(&moderation_request())
            .await
            .unwrap_err();
        assert!(matches!(err, DriftbottleError::Provider { .. }));
        assert!(err.to_string().len() < 400, "got: {err}");
    }

    #[test]
    fn retry_after_reads_whole_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }
}

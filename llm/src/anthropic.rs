//! Anthropic Messages API provider.
//!
//! Implements [`Generator`] against the Messages API. Transient failures
//! (rate limits, overload, network errors) are retried with exponential
//! backoff up to a small fixed count; everything else propagates once.

use crate::error::LlmError;
use crate::generator::{Completion, GenerationRequest, Generator, StopReason, TokenUsage};
use crate::message::{ContentBlock, Message, Role};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anthropic API base URL
const API_BASE: &str = "https://api.anthropic.com/v1";

/// API version header value
const API_VERSION: &str = "2023-06-01";

/// Attempts per request (1 initial + retries)
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Anthropic Messages API generator
pub struct AnthropicGenerator {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicGenerator {
    /// Create a new generator with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| LlmError::Configuration("ANTHROPIC_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    fn build_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LlmError::Configuration(format!("Invalid API key: {}", e)))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn to_api_request(&self, request: &GenerationRequest) -> ApiRequest {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: m.content.iter().map(|c| c.into()).collect(),
            })
            .collect();

        let tools: Vec<ApiTool> = request
            .tools
            .iter()
            .map(|t| ApiTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        ApiRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages,
            temperature: request.temperature,
            tools,
        }
    }

    fn parse_response(&self, api_response: ApiResponse) -> Completion {
        let content: Vec<ContentBlock> = api_response
            .content
            .into_iter()
            .map(|c| match c {
                ApiContent::Text { text } => ContentBlock::Text { text },
                ApiContent::ToolUse { id, name, input } => {
                    ContentBlock::ToolUse { id, name, input }
                }
            })
            .collect();

        let stop_reason = match api_response.stop_reason.as_str() {
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "tool_use" => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        };

        Completion {
            message: Message::new(Role::Assistant, content),
            stop_reason,
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }

    async fn send_once(&self, api_request: &ApiRequest) -> Result<Completion, LlmError> {
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{}/messages", API_BASE))
            .headers(headers)
            .json(api_request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited { retry_after });
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(self.parse_response(api_response))
    }
}

/// Delay before the given retry attempt (0-based): base * 2^attempt.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt)
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Completion, LlmError> {
        let api_request = self.to_api_request(&request);

        let mut attempt = 0;
        loop {
            match self.send_once(&api_request).await {
                Ok(completion) => return Ok(completion),
                Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = match &err {
                        LlmError::RateLimited {
                            retry_after: Some(after),
                        } => *after,
                        _ => backoff_delay(attempt),
                    };
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "generator call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// API request/response types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: Option<bool>,
    },
}

impl From<&ContentBlock> for ApiContentBlock {
    fn from(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
            ContentBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => ApiContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: Some(*is_error),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
    stop_reason: String,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_creation() {
        let generator = AnthropicGenerator::new("test-key");
        assert_eq!(generator.name(), "anthropic");
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
    }

    #[test]
    fn parses_tool_use_response() {
        let body = r#"{
            "content": [
                {"type": "text", "text": "Let me roll that."},
                {"type": "tool_use", "id": "toolu_1", "name": "roll_dice",
                 "input": {"expression": "1d20+5"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }"#;
        let api_response: ApiResponse = serde_json::from_str(body).unwrap();
        let generator = AnthropicGenerator::new("test-key");
        let completion = generator.parse_response(api_response);

        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        assert!(completion.has_tool_calls());
        let uses = completion.message.tool_uses();
        assert_eq!(uses[0].0, "toolu_1");
        assert_eq!(uses[0].1, "roll_dice");
        assert_eq!(completion.usage.total(), 30);
    }
}

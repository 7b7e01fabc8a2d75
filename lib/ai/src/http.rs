//! OpenAI-compatible chat completions backend.
//!
//! Works against OpenAI itself and against Ollama's `/v1` endpoint.

use crate::backend::{LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
use crate::error::LlmError;
use crate::parse;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP LLM backend.
#[derive(Debug, Clone)]
pub struct HttpLlmBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

#[derive(Deserialize)]
struct ChatCompletion {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl HttpLlmBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the base URL is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: LlmBackendConfig) -> Result<Self, LlmError> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "base_url must not be empty".to_string(),
            });
        }
        if config.provider == LlmProvider::OpenAi && config.api_key.is_none() {
            return Err(LlmError::InvalidConfig {
                reason: "the openai provider requires an api_key".to_string(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn body(&self, request: &LlmRequest) -> JsonValue {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.json_output {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    #[instrument(skip(self, request), fields(provider = ?self.config.provider, model = %self.config.model))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut builder = self.client.post(self.endpoint()).json(&self.body(request));
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::RequestFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                reason: format!("provider returned {status}"),
            });
        }

        let completion: ChatCompletion =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "response contained no message content".to_string(),
            })?;

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        debug!(total_tokens = usage.total(), "chat completion received");

        let structured_output = if request.json_output {
            parse::extract_json_object(&content)
        } else {
            None
        };

        Ok(LlmResponse {
            content,
            structured_output,
            usage,
            model: completion.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }

    fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_base_url() {
        let config = LlmBackendConfig::ollama("  ", "llama3");
        assert!(matches!(
            HttpLlmBackend::new(config),
            Err(LlmError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn openai_requires_key() {
        let mut config = LlmBackendConfig::openai("sk-test", "gpt-4o-mini");
        config.api_key = None;
        assert!(HttpLlmBackend::new(config).is_err());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let backend =
            HttpLlmBackend::new(LlmBackendConfig::ollama("http://localhost:11434/", "llama3"))
                .expect("backend");
        assert_eq!(
            backend.endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn body_includes_system_and_json_mode() {
        let backend =
            HttpLlmBackend::new(LlmBackendConfig::ollama("http://localhost:11434", "llama3"))
                .expect("backend");
        let request = LlmRequest::new("assess")
            .with_system("reviewer")
            .with_json_output()
            .with_temperature(0.0);

        let body = backend.body(&request);
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "assess");
        assert_eq!(body["response_format"]["type"], "json_object");
    }
}

//! Model backends the advisor can call.
//!
//! Every supported provider speaks the OpenAI chat-completions dialect, so
//! one HTTP client covers them all (see `http`).

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Where the model is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// A local Ollama daemon.
    Ollama,
    /// api.openai.com.
    OpenAi,
    /// Any other server with a chat-completions endpoint.
    OpenAiCompatible,
}

/// Connection settings for a model backend, read from the `[llm]` config table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// Hosting provider.
    pub provider: LlmProvider,
    /// Root URL; `/v1/chat/completions` is appended.
    pub base_url: String,
    /// Model name as the provider knows it.
    pub model: String,
    /// Bearer token, when the provider wants one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl LlmBackendConfig {
    /// Settings for an Ollama daemon at `base_url`.
    #[must_use]
    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Settings for the hosted OpenAI API.
    #[must_use]
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            api_key: Some(api_key.into()),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One prompt sent to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// User message.
    pub prompt: String,
    /// System message.
    pub system: Option<String>,
    /// Ask the provider for a JSON object response.
    pub json_output: bool,
    /// Sampling temperature; assessments use 0.
    pub temperature: Option<f32>,
    /// Cap on generated tokens.
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// A request carrying only a user message.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            json_output: false,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sets the system message.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Requests a JSON object response.
    #[must_use]
    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Caps the answer length.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A model answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Answer text.
    pub content: String,
    /// Parsed JSON output, when the provider returned one directly.
    pub structured_output: Option<JsonValue>,
    /// Tokens billed for the call.
    pub usage: TokenUsage,
    /// Model that answered.
    pub model: String,
}

impl LlmResponse {
    /// Creates a plain-text response with no usage information.
    #[must_use]
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            structured_output: None,
            usage: TokenUsage::default(),
            model: model.into(),
        }
    }
}

/// Prompt and completion token counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u32,
    /// Completion tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Prompt plus completion.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A model that answers prompts.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Sends one prompt and waits for the answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable, refuses the call or
    /// answers with something other than a completion.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Hosting provider.
    fn provider(&self) -> LlmProvider;

    /// Model name, for logging.
    fn model(&self) -> &str;
}

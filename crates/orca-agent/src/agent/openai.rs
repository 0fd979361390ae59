//! OpenAI-compatible chat-completions provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OrcaError, Result};

use super::provider::{AIMessage, AIProvider, AIResponse, GenerateOptions, TokenUsage};

/// OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Environment variable holding the API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Environment variable overriding the endpoint (proxies, Azure, local servers).
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Model calls with runbooks attached can take minutes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: OpenAIUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

/// OpenAI chat-completions provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a provider with an API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: Self::build_client()?,
            api_key: Some(api_key.into()),
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    /// Create from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(ENV_OPENAI_API_KEY).ok();
        let base_url =
            std::env::var(ENV_OPENAI_BASE_URL).unwrap_or_else(|_| OPENAI_API_URL.to_string());
        Ok(Self {
            client: Self::build_client()?,
            api_key,
            base_url,
        })
    }

    /// Set a custom endpoint URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_client() -> Result<Client> {
        Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> Result<AIResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| OrcaError::Config(format!("{ENV_OPENAI_API_KEY} not set")))?;

        let request = OpenAIRequest {
            model,
            messages: messages
                .iter()
                .map(|msg| OpenAIMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                })
                .collect(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrcaError::Generation(format!("OpenAI API request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OrcaError::Generation(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(&body) {
                return Err(OrcaError::Generation(format!(
                    "OpenAI API error: {}",
                    error_response.error.message
                )));
            }
            return Err(OrcaError::Generation(format!(
                "OpenAI API error ({status}): {body}"
            )));
        }

        let api_response: OpenAIResponse = serde_json::from_str(&body)
            .map_err(|e| OrcaError::Generation(format!("Failed to parse response: {e}")))?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(AIResponse {
            text,
            usage: TokenUsage {
                input_tokens: api_response.usage.prompt_tokens,
                output_tokens: api_response.usage.completion_tokens,
                total_tokens: api_response.usage.total_tokens,
            },
            model: api_response.model,
        })
    }
}

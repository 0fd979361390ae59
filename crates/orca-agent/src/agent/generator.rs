//! Reply generation for alert conversations.

use async_trait::async_trait;
use colored::Colorize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{OrcaError, Result};

use super::openai::DEFAULT_MODEL;
use super::prompts::{user_prompt, SYSTEM_PROMPT};
use super::provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions};
use super::runbook::RunbookFetcher;

/// Produces the reply text for a rendered conversation.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, conversation: &str) -> Result<String>;
}

/// Explains alerts with a chat model, attaching any referenced runbooks.
pub struct AlertReplyGenerator {
    provider: Arc<dyn AIProvider>,
    model: String,
    runbooks: Option<RunbookFetcher>,
    options: GenerateOptions,
    debug: bool,
}

/// Render a model exchange for inspection: every prompt message followed by
/// the assistant's reply, the model and the token usage.
#[must_use]
pub fn render_exchange(messages: &[AIMessage], response: &AIResponse) -> String {
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(out, "[{}]\n{}\n", message.role.as_str(), message.content);
    }
    let _ = writeln!(out, "[{}]\n{}\n", AIRole::Assistant.as_str(), response.text);
    let _ = write!(
        out,
        "model: {}, tokens: {} in / {} out / {} total",
        response.model,
        response.usage.input_tokens,
        response.usage.output_tokens,
        response.usage.total_tokens
    );
    out
}

impl AlertReplyGenerator {
    /// Create a generator using `provider` with the default model and no
    /// runbook retrieval.
    #[must_use]
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self {
            provider,
            model: DEFAULT_MODEL.to_string(),
            runbooks: None,
            options: GenerateOptions::default(),
            debug: false,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Enable runbook retrieval.
    #[must_use]
    pub fn with_runbooks(mut self, fetcher: RunbookFetcher) -> Self {
        self.runbooks = Some(fetcher);
        self
    }

    /// Sampling temperature and output token cap passed to the provider.
    #[must_use]
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Print each prompt and model response to stdout.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Model requests are sent to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ReplyGenerator for AlertReplyGenerator {
    async fn generate(&self, conversation: &str) -> Result<String> {
        if !self.provider.is_configured() {
            return Err(OrcaError::Config(format!(
                "{} provider is not configured",
                self.provider.name()
            )));
        }

        let runbooks = match &self.runbooks {
            Some(fetcher) => fetcher.fetch_all(conversation).await,
            None => Vec::new(),
        };
        debug!(runbooks = runbooks.len(), "Prepared prompt");

        let messages = [
            AIMessage::system(SYSTEM_PROMPT),
            AIMessage::user(user_prompt(conversation, &runbooks)),
        ];
        let response = self
            .provider
            .generate_text(&self.model, &messages, &self.options)
            .await?;

        if self.debug {
            println!("{}", "=============== Model exchange ===============".magenta().bold());
            println!("{}\n", render_exchange(&messages, &response));
        }

        if response.text.trim().is_empty() {
            return Err(OrcaError::Generation(format!(
                "model {} returned an empty reply",
                self.model
            )));
        }

        info!(
            provider = self.provider.name(),
            model = %self.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            total_tokens = response.usage.total_tokens,
            "Generated reply"
        );
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::provider::TokenUsage;
    use std::sync::Mutex;

    struct RecordingProvider {
        reply: String,
        seen: Mutex<Vec<AIMessage>>,
        options: Mutex<Option<GenerateOptions>>,
    }

    impl RecordingProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
                options: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl AIProvider for RecordingProvider {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            model: &str,
            messages: &[AIMessage],
            options: &GenerateOptions,
        ) -> Result<AIResponse> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            *self.options.lock().unwrap() = Some(options.clone());
            Ok(AIResponse {
                text: self.reply.clone(),
                usage: TokenUsage::default(),
                model: model.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_generate_sends_system_and_user_messages() {
        let provider = Arc::new(RecordingProvider::new("It's crash looping."));
        let generator = AlertReplyGenerator::new(provider.clone()).with_model("gpt-4.1-mini");

        let reply = generator.generate("* Message:\n  * content:\n    boom").await.unwrap();
        assert_eq!(reply, "It's crash looping.");
        assert_eq!(generator.model(), "gpt-4.1-mini");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, AIRole::System);
        assert_eq!(seen[1].role, AIRole::User);
        assert!(seen[1].content.contains("boom"));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_reply() {
        let generator = AlertReplyGenerator::new(Arc::new(RecordingProvider::new("  \n")));
        let err = generator.generate("alert").await.unwrap_err();
        assert!(matches!(err, OrcaError::Generation(_)));
    }

    #[tokio::test]
    async fn test_generate_passes_options_to_provider() {
        let provider = Arc::new(RecordingProvider::new("ok"));
        let generator = AlertReplyGenerator::new(provider.clone())
            .with_options(GenerateOptions {
                temperature: Some(0.2),
                max_tokens: Some(800),
            })
            .with_debug(true);

        generator.generate("alert").await.unwrap();

        let options = provider.options.lock().unwrap().clone().unwrap();
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.max_tokens, Some(800));
    }

    #[tokio::test]
    async fn test_default_options_leave_provider_defaults() {
        let provider = Arc::new(RecordingProvider::new("ok"));
        AlertReplyGenerator::new(provider.clone())
            .generate("alert")
            .await
            .unwrap();

        let options = provider.options.lock().unwrap().clone().unwrap();
        assert!(options.temperature.is_none());
        assert!(options.max_tokens.is_none());
    }

    #[test]
    fn test_render_exchange_lists_messages_reply_and_usage() {
        let messages = [AIMessage::system("be brief"), AIMessage::user("pod restarting")];
        let response = AIResponse {
            text: "It is OOMKilled.".to_string(),
            usage: TokenUsage {
                input_tokens: 12,
                output_tokens: 5,
                total_tokens: 17,
            },
            model: "gpt-4.1".to_string(),
        };

        let rendered = render_exchange(&messages, &response);
        let system = rendered.find("[system]\nbe brief").unwrap();
        let user = rendered.find("[user]\npod restarting").unwrap();
        let assistant = rendered.find("[assistant]\nIt is OOMKilled.").unwrap();
        assert!(system < user && user < assistant);
        assert!(rendered.ends_with("model: gpt-4.1, tokens: 12 in / 5 out / 17 total"));
    }
}

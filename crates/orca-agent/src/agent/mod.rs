//! Model-backed reply generation.

mod generator;
mod openai;
mod prompts;
mod provider;
mod runbook;

pub use generator::{render_exchange, AlertReplyGenerator, ReplyGenerator};
pub use openai::{OpenAIProvider, DEFAULT_MODEL, ENV_OPENAI_API_KEY, ENV_OPENAI_BASE_URL};
pub use prompts::{user_prompt, SYSTEM_PROMPT};
pub use provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, TokenUsage};
pub use runbook::{extract_runbook_urls, rewrite_github_url, RunbookConfig, RunbookFetcher};

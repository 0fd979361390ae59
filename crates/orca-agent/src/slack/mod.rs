//! Slack channel access.
//!
//! Provides the Web API client, the collaborator traits it implements,
//! thread reconstruction, and outbound chunking.

mod assembler;
mod chunk;
mod client;
mod traits;
mod types;

pub use assembler::{IdentityCache, ThreadAssembler};
pub use chunk::chunk;
pub use client::{SlackClient, DEFAULT_API_BASE, ENV_SLACK_API_BASE, ENV_SLACK_BOT_TOKEN};
pub use traits::{DeletionSource, FeedSource, IdentityResolver, Sender};
pub use types::{format_slack_ts, parse_slack_ts, Author, Message, RawAttachment, RawMessage};

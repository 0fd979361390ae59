//! # Orca Agent
//!
//! Watches a Slack alert channel and answers each new alert in its thread
//! with a model-generated explanation.
//!
//! This crate provides:
//! - Thread reconstruction from the Slack Web API with per-cycle identity caching
//! - Selection of alert threads the agent has not answered yet
//! - A polling loop with a durable timestamp watermark
//! - Reply generation with runbook enrichment
//! - A cleanup utility that removes the agent's own messages
//!
//! ## Example
//!
//! ```rust,ignore
//! use orca_agent::{ConversationFeed, ConversationFilter, SlackClient};
//! use std::sync::Arc;
//!
//! let slack = Arc::new(SlackClient::from_env()?);
//! let feed = ConversationFeed::new(slack.clone(), slack, filter);
//! for conversation in feed.fetch(None).await? {
//!     println!("{}", conversation.markdown());
//! }
//! ```

// Reply generation
pub mod agent;

// Watermark persistence
pub mod checkpoint;

// Maintenance
pub mod cleanup;

// Defaults and shared parsing
pub mod config;

// Alert selection
pub mod conversations;

// Error types
pub mod error;

// Main loop
pub mod poller;

// Slack access
pub mod slack;

// Re-export key types for convenience
pub use agent::{AIProvider, AlertReplyGenerator, OpenAIProvider, ReplyGenerator, RunbookFetcher};
pub use checkpoint::CheckpointStore;
pub use cleanup::delete_recent_messages;
pub use conversations::{select, ConversationFeed, ConversationFilter};
pub use error::{OrcaError, Result};
pub use poller::{resolve_initial_watermark, Flow, LoopState, PollConfig, PollLoop, RunSummary};
pub use slack::{chunk, DeletionSource, FeedSource, IdentityResolver, Message, Sender, SlackClient};

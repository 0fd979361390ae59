//! Collaborator traits the core consumes.
//!
//! [`SlackClient`](super::SlackClient) implements all four against the Slack
//! Web API; tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::RawMessage;
use crate::error::Result;

/// Source of raw channel records.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch up to `limit` top-level records newer than `after` (exclusive).
    async fn fetch(
        &self,
        channel: &str,
        limit: usize,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawMessage>>;

    /// Fetch the reply records of the thread rooted at `root_id`.
    ///
    /// Slack echoes the root itself as the first element.
    async fn fetch_replies(&self, channel: &str, root_id: &str) -> Result<Vec<RawMessage>>;
}

/// Resolves author ids to display names.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_human(&self, id: &str) -> Result<String>;

    async fn resolve_bot(&self, id: &str) -> Result<String>;
}

/// Outbound delivery of a (pre-chunked) reply.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Post `chunks` as one reply, threaded under `thread_id` when given.
    ///
    /// Every chunk is already within the transport's size cap.
    async fn send(&self, channel: &str, chunks: &[String], thread_id: Option<&str>)
        -> Result<()>;
}

/// Removes messages; used by the cleanup utility only.
#[async_trait]
pub trait DeletionSource: Send + Sync {
    async fn delete(&self, channel: &str, message_id: &str) -> Result<()>;
}

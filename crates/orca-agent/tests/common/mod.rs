//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use orca_agent::agent::ReplyGenerator;
use orca_agent::error::{OrcaError, Result};
use orca_agent::slack::{
    format_slack_ts, parse_slack_ts, DeletionSource, FeedSource, IdentityResolver, RawMessage,
    Sender,
};

pub const CHANNEL: &str = "alerts";
pub const ALERT_USER: &str = "Grafana notifications";
pub const AGENT_USER: &str = "orca-alerts";

// =============================================================================
// Record builders
// =============================================================================

/// A plain message from a human author.
pub fn human(ts: &str, user: &str, text: &str) -> RawMessage {
    RawMessage {
        kind: Some("message".to_string()),
        ts: ts.to_string(),
        user: Some(user.to_string()),
        text: Some(text.to_string()),
        ..RawMessage::default()
    }
}

/// A plain message from a bot.
pub fn bot(ts: &str, bot_id: &str, text: &str) -> RawMessage {
    RawMessage {
        kind: Some("message".to_string()),
        ts: ts.to_string(),
        bot_id: Some(bot_id.to_string()),
        text: Some(text.to_string()),
        ..RawMessage::default()
    }
}

/// Mark `record` as a thread root with `count` replies.
pub fn with_replies(mut record: RawMessage, count: u64) -> RawMessage {
    record.thread_ts = Some(record.ts.clone());
    record.reply_count = count;
    record
}

/// Mark `record` as a reply in the thread rooted at `root`.
pub fn in_thread(mut record: RawMessage, root: &str) -> RawMessage {
    record.thread_ts = Some(root.to_string());
    record
}

/// Slack ts for a point in time.
pub fn ts_at(time: DateTime<Utc>) -> String {
    format_slack_ts(&time)
}

// =============================================================================
// Feed
// =============================================================================

/// Channel history and thread replies held in memory.
#[derive(Default)]
pub struct FakeFeed {
    history: Mutex<Vec<RawMessage>>,
    replies: Mutex<HashMap<String, Vec<RawMessage>>>,
    pub fetch_calls: AtomicUsize,
    pub reply_calls: AtomicUsize,
    pub fail_fetch: bool,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_fetch: true,
            ..Self::default()
        }
    }

    pub fn push(&self, record: RawMessage) {
        self.history.lock().unwrap().push(record);
    }

    pub fn set_replies(&self, root: &str, records: Vec<RawMessage>) {
        self.replies
            .lock()
            .unwrap()
            .insert(root.to_string(), records);
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn fetch(
        &self,
        _channel: &str,
        limit: usize,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawMessage>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(OrcaError::FeedRead("conversations.history failed: ratelimited".into()));
        }
        let history = self.history.lock().unwrap();
        Ok(history
            .iter()
            .filter(|record| match after {
                Some(after) => parse_slack_ts(&record.ts).is_ok_and(|ts| ts > after),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_replies(&self, _channel: &str, root_id: &str) -> Result<Vec<RawMessage>> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .replies
            .lock()
            .unwrap()
            .get(root_id)
            .cloned()
            .unwrap_or_default())
    }
}

// =============================================================================
// Identities
// =============================================================================

/// Resolves ids from fixed tables and counts lookups.
#[derive(Default)]
pub struct FakeResolver {
    humans: HashMap<String, String>,
    bots: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl FakeResolver {
    /// Resolver knowing the alert bot `B1`, the agent bot `B2`, and the
    /// humans `U1` (alice) and `U2` (bob).
    pub fn standard() -> Self {
        let mut resolver = Self::default();
        resolver.bots.insert("B1".into(), ALERT_USER.into());
        resolver.bots.insert("B2".into(), AGENT_USER.into());
        resolver.humans.insert("U1".into(), "alice".into());
        resolver.humans.insert("U2".into(), "bob".into());
        resolver
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityResolver for FakeResolver {
    async fn resolve_human(&self, id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.humans
            .get(id)
            .cloned()
            .ok_or_else(|| OrcaError::IdentityLookup {
                id: id.to_string(),
                reason: "user_not_found".into(),
            })
    }

    async fn resolve_bot(&self, id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bots
            .get(id)
            .cloned()
            .ok_or_else(|| OrcaError::IdentityLookup {
                id: id.to_string(),
                reason: "bot_not_found".into(),
            })
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// A recorded `send` call.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel: String,
    pub chunks: Vec<String>,
    pub thread_id: Option<String>,
}

/// Records every message it is asked to send.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<SentMessage>>,
    pub fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sender for RecordingSender {
    async fn send(&self, channel: &str, chunks: &[String], thread_id: Option<&str>) -> Result<()> {
        if self.fail {
            return Err(OrcaError::Send {
                channel: channel.to_string(),
                reason: "chat.postMessage failed: not_in_channel".into(),
            });
        }
        self.sent.lock().unwrap().push(SentMessage {
            channel: channel.to_string(),
            chunks: chunks.to_vec(),
            thread_id: thread_id.map(str::to_string),
        });
        Ok(())
    }
}

/// Records deleted message ids in order.
#[derive(Default)]
pub struct RecordingDeleter {
    pub deleted: Mutex<Vec<String>>,
}

impl RecordingDeleter {
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeletionSource for RecordingDeleter {
    async fn delete(&self, _channel: &str, message_id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(message_id.to_string());
        Ok(())
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Returns a fixed reply; optionally trips a cancellation token on its first
/// call.
#[derive(Default)]
pub struct FixedGenerator {
    pub reply: String,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<String>>,
    pub cancel_on_first_call: Option<CancellationToken>,
}

impl FixedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    pub fn cancelling(reply: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            reply: reply.into(),
            cancel_on_first_call: Some(token),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyGenerator for FixedGenerator {
    async fn generate(&self, conversation: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(conversation.to_string());
        if let Some(token) = &self.cancel_on_first_call {
            token.cancel();
        }
        Ok(self.reply.clone())
    }
}

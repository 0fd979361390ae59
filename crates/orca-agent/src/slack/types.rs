//! Slack data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::error::{OrcaError, Result};

/// A message record as returned by `conversations.history` / `conversations.replies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    /// Record type; only `message` records carry content.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Slack timestamp id (`"<seconds>.<micros>"`).
    pub ts: String,
    /// Timestamp id of the thread root, absent on unthreaded messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Human author id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Bot author id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Number of replies in the thread (root messages only).
    #[serde(default)]
    pub reply_count: u64,
    /// Legacy attachments; alert integrations put their body here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<RawAttachment>,
}

/// A legacy message attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Who posted a record, before name resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Author {
    Human(String),
    Bot(String),
}

impl RawMessage {
    /// Whether this record is a plain message with text (joins, topic changes
    /// and other event records are skipped).
    #[must_use]
    pub fn is_plain_message(&self) -> bool {
        self.kind.as_deref() == Some("message") && self.text.is_some()
    }

    /// Author of the record. A human id wins over a bot id.
    pub fn author(&self) -> Result<Author> {
        if let Some(user) = &self.user {
            return Ok(Author::Human(user.clone()));
        }
        if let Some(bot_id) = &self.bot_id {
            return Ok(Author::Bot(bot_id.clone()));
        }
        Err(OrcaError::IdentityResolution {
            message_id: self.ts.clone(),
            reason: "neither user nor bot_id present".to_string(),
        })
    }

    /// Trimmed text with every attachment's text appended.
    #[must_use]
    pub fn content(&self) -> String {
        let mut content = self
            .text
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        for attachment in &self.attachments {
            if let Some(text) = &attachment.text {
                content.push_str(text);
            }
        }
        content
    }

    /// Thread root id; a root message is its own thread.
    #[must_use]
    pub fn thread_id(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    /// Wall-clock time of the record.
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        parse_slack_ts(&self.ts)
    }
}

/// Parse a Slack `ts` (`"1721999070.373719"`) into a UTC datetime.
pub fn parse_slack_ts(ts: &str) -> Result<DateTime<Utc>> {
    let invalid = |reason: &str| OrcaError::InvalidTimestamp {
        value: ts.to_string(),
        reason: reason.to_string(),
    };

    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    let secs: i64 = secs.parse().map_err(|_| invalid("seconds are not numeric"))?;

    let nanos = if frac.is_empty() {
        0
    } else {
        if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("fraction is not numeric"));
        }
        let padded = format!("{frac:0<9}");
        padded
            .parse::<u32>()
            .map_err(|_| invalid("fraction is not numeric"))?
    };

    DateTime::from_timestamp(secs, nanos).ok_or_else(|| invalid("out of range"))
}

/// Format a datetime as a Slack `oldest`/`latest` bound.
#[must_use]
pub fn format_slack_ts(ts: &DateTime<Utc>) -> String {
    format!("{}.{:06}", ts.timestamp(), ts.timestamp_subsec_micros())
}

/// A message with its resolved author and its replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// When the message was posted.
    pub timestamp: DateTime<Utc>,
    /// Slack `ts`; used for lookups and deletes.
    pub id: String,
    /// Root of the thread; equals `id` for a root message.
    pub thread_id: String,
    /// Display name of the poster.
    pub author_name: String,
    /// True if the poster is a bot.
    pub is_automated: bool,
    /// Message body including attachment text.
    pub text: String,
    /// Replies in feed order.
    #[serde(default)]
    pub replies: Vec<Message>,
}

impl Message {
    /// Whether this message or any descendant was posted by `author_name`.
    #[must_use]
    pub fn has_any_from(&self, author_name: &str) -> bool {
        self.author_name == author_name
            || self
                .replies
                .iter()
                .any(|reply| reply.has_any_from(author_name))
    }

    /// Number of messages in this subtree, including this one.
    #[must_use]
    pub fn message_count(&self) -> usize {
        1 + self.replies.iter().map(Message::message_count).sum::<usize>()
    }

    /// Markdown rendering of the thread, used as the model input.
    #[must_use]
    pub fn markdown(&self) -> String {
        let mut out = String::new();
        self.write_markdown(&mut out, 0);
        out
    }

    fn write_markdown(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        let _ = writeln!(out, "{pad}* Message:");
        let _ = writeln!(out, "{pad}  * timestamp: {}", format_display_ts(&self.timestamp));
        let _ = writeln!(out, "{pad}  * author: {}", self.author_name);
        let _ = writeln!(out, "{pad}  * automated: {}", self.is_automated);
        let _ = writeln!(out, "{pad}  * content:");
        for line in self.text.split('\n') {
            let _ = writeln!(out, "{pad}    {line}");
        }
        if self.replies.is_empty() {
            let _ = writeln!(out, "{pad}  * Replies: []");
        } else {
            let _ = writeln!(out, "{pad}  * Replies:");
            for reply in &self.replies {
                reply.write_markdown(out, indent + 4);
            }
        }
    }

    /// Indented plain-text dump for terminal inspection.
    #[must_use]
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        let _ = writeln!(out, "{pad}Message:");
        let _ = writeln!(out, "{pad}  timestamp: {}", format_display_ts(&self.timestamp));
        let _ = writeln!(out, "{pad}  id:        {}", self.id);
        let _ = writeln!(out, "{pad}  thread_id: {}", self.thread_id);
        let _ = writeln!(out, "{pad}  author:    {}", self.author_name);
        let _ = writeln!(out, "{pad}  automated: {}", self.is_automated);
        let _ = writeln!(out, "{pad}  content:");
        for line in self.text.split('\n') {
            let _ = writeln!(out, "{pad}   | {line}");
        }
        if self.replies.is_empty() {
            let _ = writeln!(out, "{pad}  Replies: []");
        } else {
            let _ = writeln!(out, "{pad}  Replies:");
            for reply in &self.replies {
                reply.write_pretty(out, indent + 4);
            }
        }
    }
}

fn format_display_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string()
}

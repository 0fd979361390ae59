//! Selection of alert threads that still need a reply.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::slack::{FeedSource, IdentityResolver, Message, ThreadAssembler};

/// Keep the top-level messages posted by `alert_identity` that have no
/// message anywhere in their thread from `responder_identity`.
///
/// Order is preserved.
#[must_use]
pub fn select(
    messages: Vec<Message>,
    alert_identity: &str,
    responder_identity: &str,
) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|message| {
            message.author_name == alert_identity && !message.has_any_from(responder_identity)
        })
        .collect()
}

/// Who posts alerts, who answers them, and where.
#[derive(Debug, Clone)]
pub struct ConversationFilter {
    /// Channel name to read.
    pub channel: String,
    /// Name of the poster whose messages are alerts.
    pub alert_identity: String,
    /// Name the agent replies as.
    pub responder_identity: String,
    /// Max top-level messages per fetch.
    pub limit: usize,
}

/// Fetches assembled threads from a channel.
pub struct ConversationFeed {
    feed: Arc<dyn FeedSource>,
    resolver: Arc<dyn IdentityResolver>,
    filter: ConversationFilter,
}

impl ConversationFeed {
    /// Create a feed over the given collaborators.
    #[must_use]
    pub fn new(
        feed: Arc<dyn FeedSource>,
        resolver: Arc<dyn IdentityResolver>,
        filter: ConversationFilter,
    ) -> Self {
        Self {
            feed,
            resolver,
            filter,
        }
    }

    /// Filter this feed applies.
    #[must_use]
    pub fn filter(&self) -> &ConversationFilter {
        &self.filter
    }

    /// All threads whose root is newer than `after`, fully assembled.
    ///
    /// Identity lookups are cached for the duration of this call only.
    pub async fn fetch_threads(&self, after: Option<DateTime<Utc>>) -> Result<Vec<Message>> {
        let records = self
            .feed
            .fetch(&self.filter.channel, self.filter.limit, after)
            .await?;

        let mut assembler =
            ThreadAssembler::new(self.feed.as_ref(), self.resolver.as_ref(), &self.filter.channel);
        let mut threads = Vec::with_capacity(records.len());
        for record in &records {
            if !record.is_plain_message() {
                debug!(ts = %record.ts, kind = ?record.kind, "Skipping non-message record");
                continue;
            }
            threads.push(assembler.assemble(record).await?);
        }

        debug!(
            channel = %self.filter.channel,
            threads = threads.len(),
            identity_lookups = assembler.identities().lookups(),
            "Assembled threads"
        );
        Ok(threads)
    }

    /// Alert threads newer than `after` that the responder has not answered.
    pub async fn fetch(&self, after: Option<DateTime<Utc>>) -> Result<Vec<Message>> {
        let threads = self.fetch_threads(after).await?;
        let total = threads.len();
        let selected = select(
            threads,
            &self.filter.alert_identity,
            &self.filter.responder_identity,
        );
        info!(
            channel = %self.filter.channel,
            total,
            selected = selected.len(),
            "Fetched conversations"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::parse_slack_ts;

    const ALERT: &str = "Grafana notifications";
    const AGENT: &str = "orca-alerts";

    fn msg(id: &str, author: &str, replies: Vec<Message>) -> Message {
        Message {
            timestamp: parse_slack_ts(id).unwrap(),
            id: id.to_string(),
            thread_id: id.to_string(),
            author_name: author.to_string(),
            is_automated: author != "alice",
            text: format!("text of {id}"),
            replies,
        }
    }

    #[test]
    fn test_select_unanswered_alert() {
        let selected = select(vec![msg("1.0", ALERT, vec![])], ALERT, AGENT);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_select_excludes_direct_reply() {
        let root = msg("1.0", ALERT, vec![msg("2.0", AGENT, vec![])]);
        assert!(select(vec![root], ALERT, AGENT).is_empty());
    }

    #[test]
    fn test_select_excludes_nested_reply() {
        let nested = msg("3.0", "alice", vec![msg("4.0", "bob", vec![msg("5.0", AGENT, vec![])])]);
        let root = msg("1.0", ALERT, vec![msg("2.0", "alice", vec![]), nested]);
        assert!(select(vec![root], ALERT, AGENT).is_empty());
    }

    #[test]
    fn test_select_ignores_third_party_roots() {
        let lonely = msg("1.0", "alice", vec![]);
        let discussed = msg("2.0", "bob", vec![msg("3.0", ALERT, vec![])]);
        assert!(select(vec![lonely, discussed], ALERT, AGENT).is_empty());
    }

    #[test]
    fn test_select_preserves_order() {
        let messages = vec![
            msg("3.0", ALERT, vec![]),
            msg("1.0", ALERT, vec![msg("1.5", AGENT, vec![])]),
            msg("2.0", ALERT, vec![msg("2.5", "alice", vec![])]),
        ];
        let ids: Vec<String> = select(messages, ALERT, AGENT)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["3.0", "2.0"]);
    }
}

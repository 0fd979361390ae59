//! Bulk removal of an author's messages, used to reset a channel between
//! development runs.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::conversations::ConversationFeed;
use crate::error::Result;
use crate::slack::{DeletionSource, Message};

/// Ids of every message in `message`'s tree authored by `author_name`,
/// replies before their parents.
#[must_use]
pub fn deletion_order(message: &Message, author_name: &str) -> Vec<String> {
    let mut ids = Vec::new();
    collect_leaves_first(message, author_name, &mut ids);
    ids
}

fn collect_leaves_first(message: &Message, author_name: &str, ids: &mut Vec<String>) {
    for reply in &message.replies {
        collect_leaves_first(reply, author_name, ids);
    }
    if message.author_name == author_name {
        ids.push(message.id.clone());
    }
}

/// Delete every message by `author_name` in threads newer than `after`.
///
/// Channel and fetch limit come from the feed's filter. Returns the number of
/// messages deleted; the first failed deletion aborts with an error.
pub async fn delete_recent_messages(
    feed: &ConversationFeed,
    deleter: &dyn DeletionSource,
    author_name: &str,
    after: Option<DateTime<Utc>>,
) -> Result<usize> {
    let channel = &feed.filter().channel;
    let threads = feed.fetch_threads(after).await?;
    if threads.is_empty() {
        info!(channel = %channel, "No messages to delete");
        return Ok(0);
    }

    let mut deleted = 0;
    for thread in &threads {
        for id in deletion_order(thread, author_name) {
            deleter.delete(channel, &id).await?;
            debug!(channel = %channel, id = %id, "Deleted message");
            deleted += 1;
        }
    }

    info!(channel = %channel, author = author_name, deleted, "Deleted messages");
    Ok(deleted)
}

//! Deleting an author's recent messages.

mod common;

use common::*;
use orca_agent::cleanup::delete_recent_messages;
use orca_agent::conversations::{ConversationFeed, ConversationFilter};
use std::sync::Arc;

fn conversations(feed: Arc<FakeFeed>) -> ConversationFeed {
    let filter = ConversationFilter {
        channel: CHANNEL.to_string(),
        alert_identity: ALERT_USER.to_string(),
        responder_identity: AGENT_USER.to_string(),
        limit: 1000,
    };
    ConversationFeed::new(feed, Arc::new(FakeResolver::standard()), filter)
}

#[tokio::test]
async fn test_deletes_agent_messages_replies_first() {
    let feed = Arc::new(FakeFeed::new());
    feed.push(with_replies(bot("100.0", "B1", "alert"), 2));
    feed.set_replies(
        "100.0",
        vec![
            in_thread(bot("101.0", "B2", "explanation"), "100.0"),
            in_thread(human("102.0", "U1", "thanks"), "100.0"),
        ],
    );
    // A top-level agent post with its own reply from the agent
    feed.push(with_replies(bot("200.0", "B2", "status"), 1));
    feed.set_replies("200.0", vec![in_thread(bot("201.0", "B2", "follow-up"), "200.0")]);

    let deleter = RecordingDeleter::default();
    let deleted = delete_recent_messages(&conversations(feed), &deleter, AGENT_USER, None)
        .await
        .unwrap();

    assert_eq!(deleted, 3);
    assert_eq!(deleter.deleted(), vec!["101.0", "201.0", "200.0"]);
}

#[tokio::test]
async fn test_nothing_to_delete() {
    let feed = Arc::new(FakeFeed::new());
    feed.push(bot("100.0", "B1", "alert"));

    let deleter = RecordingDeleter::default();
    let deleted = delete_recent_messages(&conversations(feed), &deleter, AGENT_USER, None)
        .await
        .unwrap();

    assert_eq!(deleted, 0);
    assert!(deleter.deleted().is_empty());
}

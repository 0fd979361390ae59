//! Thread reconstruction from flat channel records.
//!
//! A [`ThreadAssembler`] lives for one poll cycle. It resolves author names
//! through an [`IdentityCache`] so that repeated posters cost one lookup per
//! cycle, while renames between cycles are still picked up.

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use tracing::debug;

use super::traits::{FeedSource, IdentityResolver};
use super::types::{Author, Message, RawMessage};
use crate::error::Result;

/// Per-cycle memo of `id -> name` for humans and bots.
#[derive(Debug, Default)]
pub struct IdentityCache {
    humans: HashMap<String, String>,
    bots: HashMap<String, String>,
    lookups: usize,
}

impl IdentityCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an author to `(name, is_automated)`, calling the resolver only
    /// on a cache miss.
    pub async fn resolve(
        &mut self,
        resolver: &dyn IdentityResolver,
        author: &Author,
    ) -> Result<(String, bool)> {
        match author {
            Author::Human(id) => {
                if let Some(name) = self.humans.get(id) {
                    return Ok((name.clone(), false));
                }
                let name = resolver.resolve_human(id).await?;
                self.lookups += 1;
                self.humans.insert(id.clone(), name.clone());
                Ok((name, false))
            }
            Author::Bot(id) => {
                if let Some(name) = self.bots.get(id) {
                    return Ok((name.clone(), true));
                }
                let name = resolver.resolve_bot(id).await?;
                self.lookups += 1;
                self.bots.insert(id.clone(), name.clone());
                Ok((name, true))
            }
        }
    }

    /// Number of resolver calls made so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

/// Builds [`Message`] trees from raw records.
pub struct ThreadAssembler<'a> {
    feed: &'a dyn FeedSource,
    resolver: &'a dyn IdentityResolver,
    channel: &'a str,
    identities: IdentityCache,
}

impl<'a> ThreadAssembler<'a> {
    /// Create an assembler with a fresh identity cache.
    #[must_use]
    pub fn new(
        feed: &'a dyn FeedSource,
        resolver: &'a dyn IdentityResolver,
        channel: &'a str,
    ) -> Self {
        Self {
            feed,
            resolver,
            channel,
            identities: IdentityCache::new(),
        }
    }

    /// Identity cache of this pass.
    #[must_use]
    pub fn identities(&self) -> &IdentityCache {
        &self.identities
    }

    /// Assemble a root record and, recursively, all of its replies.
    pub async fn assemble(&mut self, record: &RawMessage) -> Result<Message> {
        self.assemble_node(record, &record.ts).await
    }

    fn assemble_node<'s>(
        &'s mut self,
        record: &'s RawMessage,
        root_id: &'s str,
    ) -> BoxFuture<'s, Result<Message>> {
        async move {
            let author = record.author()?;
            let (author_name, is_automated) =
                self.identities.resolve(self.resolver, &author).await?;

            let mut message = Message {
                timestamp: record.timestamp()?,
                id: record.ts.clone(),
                thread_id: record.thread_id().to_string(),
                author_name,
                is_automated,
                text: record.content(),
                replies: Vec::new(),
            };

            if record.reply_count == 0 {
                return Ok(message);
            }

            let reply_records = self.feed.fetch_replies(self.channel, &record.ts).await?;
            for reply in &reply_records {
                // The feed echoes the thread root into its own reply list
                if reply.ts == root_id || reply.ts == record.ts {
                    continue;
                }
                if !reply.is_plain_message() {
                    debug!(
                        ts = %reply.ts,
                        kind = ?reply.kind,
                        "Skipping non-message reply record"
                    );
                    continue;
                }
                let assembled = self.assemble_node(reply, root_id).await?;
                message.replies.push(assembled);
            }

            Ok(message)
        }
        .boxed()
    }
}

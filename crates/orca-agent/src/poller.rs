//! Alert polling loop.
//!
//! Each cycle fetches unanswered alert threads newer than the watermark,
//! generates a reply for each, posts it in-thread, then advances and persists
//! the watermark. The watermark is captured at the start of the cycle so
//! anything posted while a cycle runs is seen again on the next one.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::ReplyGenerator;
use crate::checkpoint::CheckpointStore;
use crate::config::{DEFAULT_CHECK_INTERVAL_SECS, MAX_CHUNK_SIZE};
use crate::conversations::ConversationFeed;
use crate::error::Result;
use crate::slack::{chunk, Message, Sender};

/// Configuration for the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep between cycles.
    pub interval: Duration,
    /// Print the first reply instead of sending it, then stop.
    pub dry_run: bool,
    /// Max characters per outbound chunk.
    pub max_chunk_size: usize,
    /// Stop after this many completed cycles.
    pub max_cycles: Option<usize>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            dry_run: false,
            max_chunk_size: MAX_CHUNK_SIZE,
            max_cycles: None,
        }
    }
}

/// Where the loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Processing,
    Advancing,
    Sleeping,
    Stopped,
}

/// Whether the loop keeps going after handling a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone)]
pub struct CycleResult {
    /// Conversations that needed a reply.
    pub conversations: usize,
    /// Replies posted to the channel.
    pub replies_sent: usize,
    /// Whether the watermark moved.
    pub advanced: bool,
    /// Reply printed in dry-run mode.
    pub preview: Option<String>,
    pub flow: Flow,
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Cycles that reached the advancing step.
    pub cycles: usize,
    pub replies_sent: usize,
    /// Reply printed in dry-run mode.
    pub dry_run_preview: Option<String>,
    /// Watermark when the loop stopped.
    pub watermark: DateTime<Utc>,
}

/// Pick the starting watermark: an explicit override, else the persisted
/// checkpoint, else `now - lookback`.
pub fn resolve_initial_watermark(
    override_ts: Option<DateTime<Utc>>,
    store: &CheckpointStore,
    lookback: ChronoDuration,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    if let Some(ts) = override_ts {
        debug!(watermark = %ts, "Using explicit watermark");
        return Ok(ts);
    }
    if let Some(ts) = store.load()? {
        debug!(watermark = %ts, path = %store.path().display(), "Using checkpoint watermark");
        return Ok(ts);
    }
    let ts = now - lookback;
    debug!(watermark = %ts, "No checkpoint; using lookback");
    Ok(ts)
}

/// Drives fetch, reply and checkpoint cycles.
pub struct PollLoop {
    feed: ConversationFeed,
    generator: Arc<dyn ReplyGenerator>,
    sender: Arc<dyn Sender>,
    store: CheckpointStore,
    config: PollConfig,
    watermark: DateTime<Utc>,
    state: LoopState,
    cancel: CancellationToken,
}

impl PollLoop {
    /// Create a loop starting at `watermark`.
    #[must_use]
    pub fn new(
        feed: ConversationFeed,
        generator: Arc<dyn ReplyGenerator>,
        sender: Arc<dyn Sender>,
        store: CheckpointStore,
        config: PollConfig,
        watermark: DateTime<Utc>,
    ) -> Self {
        Self {
            feed,
            generator,
            sender,
            store,
            config,
            watermark,
            state: LoopState::Idle,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned stop signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the loop at the next conversation boundary.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[must_use]
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Run cycles until stopped, the cycle budget runs out, or an error occurs.
    pub async fn run(&mut self) -> Result<RunSummary> {
        info!(
            channel = %self.feed.filter().channel,
            watermark = %self.watermark,
            dry_run = self.config.dry_run,
            "Entering poll loop"
        );

        let mut summary = RunSummary {
            cycles: 0,
            replies_sent: 0,
            dry_run_preview: None,
            watermark: self.watermark,
        };

        loop {
            if self.cancel.is_cancelled() {
                info!(cycles = summary.cycles, "Stop requested before fetching");
                break;
            }
            let result = match self.run_cycle().await {
                Ok(result) => result,
                Err(e) => {
                    self.state = LoopState::Stopped;
                    return Err(e);
                }
            };
            summary.replies_sent += result.replies_sent;
            if result.advanced {
                summary.cycles += 1;
            }
            if result.preview.is_some() {
                summary.dry_run_preview = result.preview;
            }
            summary.watermark = self.watermark;

            if result.flow == Flow::Stop {
                info!(cycles = summary.cycles, "Poll loop stopped");
                break;
            }
            if self
                .config
                .max_cycles
                .is_some_and(|max| summary.cycles >= max)
            {
                info!(cycles = summary.cycles, "Cycle budget exhausted");
                break;
            }

            self.state = LoopState::Sleeping;
            info!(
                replies_sent = result.replies_sent,
                interval_secs = self.config.interval.as_secs(),
                "Sleeping until next check"
            );
            tokio::time::sleep(self.config.interval).await;
        }

        self.state = LoopState::Stopped;
        Ok(summary)
    }

    /// Execute a single fetch, process, advance cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleResult> {
        self.state = LoopState::Fetching;
        let next_watermark = Utc::now();
        info!(since = %self.watermark, "Checking for conversations");
        let conversations = self.feed.fetch(Some(self.watermark)).await?;

        self.state = LoopState::Processing;
        let mut result = CycleResult {
            conversations: conversations.len(),
            replies_sent: 0,
            advanced: false,
            preview: None,
            flow: Flow::Continue,
        };

        for conversation in &conversations {
            if self.cancel.is_cancelled() {
                info!("Stop requested; leaving watermark unchanged");
                result.flow = Flow::Stop;
                break;
            }
            let (flow, preview) = self.handle_conversation(conversation).await?;
            match preview {
                Some(reply) => result.preview = Some(reply),
                None => result.replies_sent += 1,
            }
            if flow == Flow::Stop {
                result.flow = Flow::Stop;
                break;
            }
        }

        // A stop raised while the last conversation was in flight
        if result.flow == Flow::Continue && self.cancel.is_cancelled() {
            info!("Stop requested; leaving watermark unchanged");
            result.flow = Flow::Stop;
        }

        if result.flow == Flow::Stop {
            self.state = LoopState::Stopped;
            return Ok(result);
        }

        self.state = LoopState::Advancing;
        self.watermark = next_watermark;
        if !self.config.dry_run {
            self.store.save(next_watermark)?;
        }
        result.advanced = true;
        info!(
            processed = result.conversations,
            replies_sent = result.replies_sent,
            watermark = %self.watermark,
            "Cycle complete"
        );
        Ok(result)
    }

    /// Reply to one conversation. Returns the printed reply in dry-run mode.
    async fn handle_conversation(&self, conversation: &Message) -> Result<(Flow, Option<String>)> {
        let input = conversation.markdown();
        info!(
            id = %conversation.id,
            input_length = input.len(),
            "Generating reply"
        );
        let reply = self.generator.generate(&input).await?;

        if self.config.dry_run {
            let channel = &self.feed.filter().channel;
            info!(
                channel = %channel,
                length = reply.len(),
                "[DRY RUN] Would send reply"
            );
            println!("{}", "=============== Reply preview ===============".cyan().bold());
            println!("{reply}\n");
            return Ok((Flow::Stop, Some(reply)));
        }

        let chunks = chunk(&reply, self.config.max_chunk_size);
        self.sender
            .send(
                &self.feed.filter().channel,
                &chunks,
                Some(&conversation.thread_id),
            )
            .await?;
        info!(
            id = %conversation.id,
            chunks = chunks.len(),
            length = reply.len(),
            "Sent reply"
        );
        Ok((Flow::Continue, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_watermark_override_wins() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("check.txt"));
        let saved = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        store.save(saved).unwrap();
        let explicit = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        let ts = resolve_initial_watermark(Some(explicit), &store, ChronoDuration::hours(24), Utc::now())
            .unwrap();
        assert_eq!(ts, explicit);
    }

    #[test]
    fn test_watermark_checkpoint_before_lookback() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("check.txt"));
        let saved = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        store.save(saved).unwrap();

        let ts =
            resolve_initial_watermark(None, &store, ChronoDuration::hours(24), Utc::now()).unwrap();
        assert_eq!(ts, saved);
    }

    #[test]
    fn test_watermark_falls_back_to_lookback() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("missing.txt"));
        let now = Utc.with_ymd_and_hms(2025, 7, 27, 12, 0, 0).unwrap();

        let ts = resolve_initial_watermark(None, &store, ChronoDuration::hours(24), now).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 7, 26, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_watermark_malformed_checkpoint_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("check.txt");
        std::fs::write(&path, "garbage").unwrap();

        let store = CheckpointStore::new(&path);
        assert!(resolve_initial_watermark(None, &store, ChronoDuration::hours(24), Utc::now()).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.max_chunk_size, 3000);
        assert!(!config.dry_run);
        assert!(config.max_cycles.is_none());
    }
}

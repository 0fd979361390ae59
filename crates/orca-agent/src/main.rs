//! Orca agent CLI - explains Grafana alerts posted to Slack.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orca_agent::agent::{
    AlertReplyGenerator, GenerateOptions, OpenAIProvider, RunbookConfig, RunbookFetcher,
    DEFAULT_MODEL,
};
use orca_agent::checkpoint::CheckpointStore;
use orca_agent::cleanup;
use orca_agent::config::{
    parse_timestamp, DEFAULT_AGENT_USER, DEFAULT_ALERT_CHANNEL, DEFAULT_ALERT_USER,
    DEFAULT_CHECKPOINT_FILE, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_FETCH_LIMIT,
    DEFAULT_LOOKBACK_HOURS, MAX_CHUNK_SIZE,
};
use orca_agent::conversations::{ConversationFeed, ConversationFilter};
use orca_agent::poller::{resolve_initial_watermark, PollConfig, PollLoop};
use orca_agent::slack::SlackClient;

/// Orca agent - answer Grafana alerts in their Slack threads.
#[derive(Parser)]
#[command(name = "orca-agent")]
#[command(about = "Explain Grafana alerts posted to a Slack channel")]
#[command(version)]
pub struct Cli {
    /// Log level (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the alert channel and reply to new alerts
    Run {
        /// Slack channel where alerts are posted
        #[arg(long, default_value = DEFAULT_ALERT_CHANNEL)]
        alert_slack_channel: String,

        /// Slack user the agent posts as
        #[arg(long, default_value = DEFAULT_AGENT_USER)]
        agent_slack_user: String,

        /// Slack user that posts the alerts
        #[arg(long, default_value = DEFAULT_ALERT_USER)]
        alert_slack_user: String,

        /// Model used to generate replies
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,

        /// Sampling temperature (provider default when unset)
        #[arg(long)]
        temperature: Option<f32>,

        /// Cap on tokens generated per reply
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Print each prompt and model response
        #[arg(long)]
        debug: bool,

        /// Start from this time instead of the checkpoint file (ISO-8601)
        #[arg(long)]
        last_check_time: Option<String>,

        /// File holding the last check time
        #[arg(long, default_value = DEFAULT_CHECKPOINT_FILE)]
        check_time_file: PathBuf,

        /// Seconds to sleep between checks
        #[arg(long, default_value_t = DEFAULT_CHECK_INTERVAL_SECS)]
        check_interval_seconds: u64,

        /// Max top-level messages fetched per check
        #[arg(long, default_value_t = DEFAULT_FETCH_LIMIT)]
        limit: usize,

        /// Print the first reply instead of sending it, then exit
        #[arg(long)]
        dry_run: bool,

        /// Run a single check and exit (for CronJob use)
        #[arg(long, conflicts_with = "max_cycles")]
        once: bool,

        /// Exit after this many checks
        #[arg(long)]
        max_cycles: Option<usize>,
    },

    /// Print the conversations that still need a reply
    Dump {
        #[arg(long, default_value = DEFAULT_ALERT_CHANNEL)]
        alert_slack_channel: String,

        #[arg(long, default_value = DEFAULT_AGENT_USER)]
        agent_slack_user: String,

        #[arg(long, default_value = DEFAULT_ALERT_USER)]
        alert_slack_user: String,

        /// Start from this time instead of the checkpoint file (ISO-8601)
        #[arg(long, alias = "later-than")]
        last_check_time: Option<String>,

        /// File holding the last check time
        #[arg(long, default_value = DEFAULT_CHECKPOINT_FILE)]
        check_time_file: PathBuf,

        #[arg(long, default_value_t = DEFAULT_FETCH_LIMIT)]
        limit: usize,

        /// Indented dump instead of markdown
        #[arg(long)]
        pretty: bool,
    },

    /// Delete recent messages from a user
    Delete {
        #[arg(long, default_value = DEFAULT_ALERT_CHANNEL)]
        alert_slack_channel: String,

        /// User whose messages are deleted
        #[arg(long, default_value = DEFAULT_AGENT_USER)]
        slack_user: String,

        /// Only threads newer than this time (ISO-8601)
        #[arg(long)]
        later_than: Option<String>,

        /// Max top-level messages examined
        #[arg(long, default_value_t = 1000)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("orca_agent=debug,info")
    } else {
        EnvFilter::try_new(&cli.log).context("invalid --log level")?
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            alert_slack_channel,
            agent_slack_user,
            alert_slack_user,
            model,
            temperature,
            max_tokens,
            debug,
            last_check_time,
            check_time_file,
            check_interval_seconds,
            limit,
            dry_run,
            once,
            max_cycles,
        } => {
            tracing::info!(
                channel = %alert_slack_channel,
                agent_user = %agent_slack_user,
                alert_user = %alert_slack_user,
                model,
                dry_run,
                "Starting orca agent"
            );
            let filter = ConversationFilter {
                channel: alert_slack_channel,
                alert_identity: alert_slack_user,
                responder_identity: agent_slack_user,
                limit,
            };
            let config = PollConfig {
                interval: Duration::from_secs(check_interval_seconds),
                dry_run,
                max_chunk_size: MAX_CHUNK_SIZE,
                max_cycles: if once { Some(1) } else { max_cycles },
            };
            let generation = GenerationSettings {
                model,
                options: GenerateOptions {
                    temperature,
                    max_tokens,
                },
                debug,
            };
            run_agent(filter, config, generation, last_check_time, check_time_file).await
        }
        Commands::Dump {
            alert_slack_channel,
            agent_slack_user,
            alert_slack_user,
            last_check_time,
            check_time_file,
            limit,
            pretty,
        } => {
            let filter = ConversationFilter {
                channel: alert_slack_channel,
                alert_identity: alert_slack_user,
                responder_identity: agent_slack_user,
                limit,
            };
            let after = initial_watermark(last_check_time.as_deref(), &check_time_file)?;
            run_dump(filter, after, pretty).await
        }
        Commands::Delete {
            alert_slack_channel,
            slack_user,
            later_than,
            limit,
        } => {
            tracing::info!(channel = %alert_slack_channel, user = %slack_user, limit, "Deleting messages");
            let filter = ConversationFilter {
                channel: alert_slack_channel,
                alert_identity: String::new(),
                responder_identity: slack_user.clone(),
                limit,
            };
            run_delete(filter, &slack_user, later_than).await
        }
    }
}

fn slack_feed(filter: ConversationFilter) -> Result<ConversationFeed> {
    let slack = Arc::new(SlackClient::from_env().context("failed to create Slack client")?);
    Ok(ConversationFeed::new(slack.clone(), slack, filter))
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|v| parse_timestamp(v).with_context(|| format!("invalid timestamp: {v}")))
        .transpose()
}

/// Lower bound shared by `run` and `dump`: explicit time, else the check-time
/// file, else the lookback window.
fn initial_watermark(last_check_time: Option<&str>, check_time_file: &Path) -> Result<DateTime<Utc>> {
    let watermark = resolve_initial_watermark(
        parse_optional_time(last_check_time)?,
        &CheckpointStore::new(check_time_file),
        ChronoDuration::hours(DEFAULT_LOOKBACK_HOURS),
        Utc::now(),
    )?;
    Ok(watermark)
}

struct GenerationSettings {
    model: String,
    options: GenerateOptions,
    debug: bool,
}

async fn run_agent(
    filter: ConversationFilter,
    config: PollConfig,
    generation: GenerationSettings,
    last_check_time: Option<String>,
    check_time_file: PathBuf,
) -> Result<()> {
    let slack = Arc::new(SlackClient::from_env().context("failed to create Slack client")?);
    let feed = ConversationFeed::new(slack.clone(), slack.clone(), filter);

    let provider = Arc::new(OpenAIProvider::from_env()?);
    let generator = AlertReplyGenerator::new(provider)
        .with_model(generation.model)
        .with_options(generation.options)
        .with_debug(generation.debug)
        .with_runbooks(RunbookFetcher::new(RunbookConfig::default())?);

    let watermark = initial_watermark(last_check_time.as_deref(), &check_time_file)?;
    let store = CheckpointStore::new(&check_time_file);

    let mut poll_loop = PollLoop::new(feed, Arc::new(generator), slack, store, config, watermark);

    let cancel = poll_loop.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current conversation");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let summary = poll_loop.run().await?;

    println!("\n{}", "Orca agent summary".bold());
    println!("   Cycles: {}", summary.cycles);
    println!("   Replies sent: {}", summary.replies_sent);
    println!("   Watermark: {}", summary.watermark.to_rfc3339());
    if summary.dry_run_preview.is_some() {
        println!("   {}", "Dry run: no messages sent".yellow());
    }
    Ok(())
}

async fn run_dump(filter: ConversationFilter, after: DateTime<Utc>, pretty: bool) -> Result<()> {
    tracing::debug!(after = %after, "Dumping conversations");
    let feed = slack_feed(filter)?;
    let conversations = feed.fetch(Some(after)).await?;

    if conversations.is_empty() {
        println!("{}", "No conversations need a reply".green());
        return Ok(());
    }
    for conversation in &conversations {
        if pretty {
            println!("{}", conversation.pretty());
        } else {
            println!("{}", conversation.markdown());
        }
    }
    println!(
        "{}",
        format!("{} conversation(s) need a reply", conversations.len()).yellow()
    );
    Ok(())
}

async fn run_delete(
    filter: ConversationFilter,
    slack_user: &str,
    later_than: Option<String>,
) -> Result<()> {
    let after = parse_optional_time(later_than.as_deref())?;
    let slack = Arc::new(SlackClient::from_env().context("failed to create Slack client")?);
    let feed = ConversationFeed::new(slack.clone(), slack.clone(), filter);
    let deleted = cleanup::delete_recent_messages(&feed, slack.as_ref(), slack_user, after).await?;
    println!("Deleted {deleted} messages");
    Ok(())
}

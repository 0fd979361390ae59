//! Slack Web API client.
//!
//! Implements every collaborator trait the core needs on top of a single
//! bot token. Channel names are resolved to ids once and memoized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::traits::{DeletionSource, FeedSource, IdentityResolver, Sender};
use super::types::{format_slack_ts, RawMessage};
use crate::error::{OrcaError, Result};

/// Environment variable holding the bot token.
pub const ENV_SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";

/// Environment variable overriding the API base URL.
pub const ENV_SLACK_API_BASE: &str = "SLACK_API_BASE";

/// Default Slack Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Largest page Slack serves for history and list calls.
const MAX_PAGE_SIZE: usize = 200;

/// Slack rejects messages carrying more blocks than this.
const MAX_BLOCKS_PER_MESSAGE: usize = 50;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack Web API client.
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    channel_ids: Mutex<HashMap<String, String>>,
}

impl SlackClient {
    /// Create a client for `api_base` authenticated with `token`.
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        Self::with_timeout(token, api_base, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with an explicit per-request timeout.
    pub fn with_timeout(
        token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(OrcaError::Config("Slack bot token is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent("orca-agent")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            channel_ids: Mutex::new(HashMap::new()),
        })
    }

    /// Create a client from `SLACK_BOT_TOKEN` (and optional `SLACK_API_BASE`).
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(ENV_SLACK_BOT_TOKEN)
            .map_err(|_| OrcaError::Config(format!("{ENV_SLACK_BOT_TOKEN} not set")))?;
        let api_base =
            std::env::var(ENV_SLACK_API_BASE).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self::new(token, api_base)
    }

    /// Resolve a channel name (with or without a leading `#`) to its id.
    pub async fn channel_id(&self, channel_name: &str) -> Result<String> {
        let name = channel_name.trim_start_matches('#');
        let mut cache = self.channel_ids.lock().await;
        if let Some(id) = cache.get(name) {
            return Ok(id.clone());
        }

        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", MAX_PAGE_SIZE.to_string()),
            ];
            if let Some(next) = &cursor {
                query.push(("cursor", next.clone()));
            }

            let page: ChannelListBody = self
                .get("conversations.list", &query)
                .await
                .map_err(OrcaError::FeedRead)?;

            if let Some(found) = page.channels.iter().find(|c| c.name == name) {
                debug!(channel = name, id = %found.id, "Resolved channel id");
                cache.insert(name.to_string(), found.id.clone());
                return Ok(found.id.clone());
            }

            cursor = page.response_metadata.next_cursor();
            if cursor.is_none() {
                return Err(OrcaError::ChannelNotFound(name.to_string()));
            }
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn get<T>(&self, method: &str, query: &[(&str, String)]) -> std::result::Result<T, String>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| format!("{method} request failed: {e}"))?;
        Self::decode(method, response).await
    }

    async fn post<T>(&self, method: &str, payload: &Value) -> std::result::Result<T, String>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .map_err(|e| format!("{method} request failed: {e}"))?;
        Self::decode(method, response).await
    }

    async fn decode<T>(method: &str, response: reqwest::Response) -> std::result::Result<T, String>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read {method} response: {e}"))?;

        if !status.is_success() {
            return Err(format!(
                "{method} returned {status}: {}",
                truncate_for_error(&body, 400)
            ));
        }

        // Slack reports most application errors as 200 with `ok: false`
        let envelope: SlackEnvelope =
            serde_json::from_str(&body).map_err(|e| format!("failed to decode {method}: {e}"))?;
        if !envelope.ok {
            return Err(format!(
                "{method} failed: {}",
                envelope.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        serde_json::from_str(&body).map_err(|e| format!("failed to decode {method}: {e}"))
    }
}

#[async_trait]
impl FeedSource for SlackClient {
    async fn fetch(
        &self,
        channel: &str,
        limit: usize,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawMessage>> {
        let channel_id = self.channel_id(channel).await?;
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        while messages.len() < limit {
            let page_size = (limit - messages.len()).min(MAX_PAGE_SIZE);
            let mut query = vec![
                ("channel", channel_id.clone()),
                ("limit", page_size.to_string()),
            ];
            if let Some(after) = &after {
                query.push(("oldest", format_slack_ts(after)));
            }
            if let Some(next) = &cursor {
                query.push(("cursor", next.clone()));
            }

            let page: HistoryBody = self
                .get("conversations.history", &query)
                .await
                .map_err(OrcaError::FeedRead)?;
            let received = page.messages.len();
            messages.extend(page.messages);

            cursor = page.response_metadata.next_cursor();
            if !page.has_more || cursor.is_none() || received == 0 {
                break;
            }
        }

        messages.truncate(limit);
        debug!(channel, count = messages.len(), "Fetched channel history");
        Ok(messages)
    }

    async fn fetch_replies(&self, channel: &str, root_id: &str) -> Result<Vec<RawMessage>> {
        let channel_id = self.channel_id(channel).await?;
        let mut replies = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("channel", channel_id.clone()),
                ("ts", root_id.to_string()),
                ("limit", MAX_PAGE_SIZE.to_string()),
            ];
            if let Some(next) = &cursor {
                query.push(("cursor", next.clone()));
            }

            let page: HistoryBody = self
                .get("conversations.replies", &query)
                .await
                .map_err(OrcaError::FeedRead)?;
            replies.extend(page.messages);

            cursor = page.response_metadata.next_cursor();
            if !page.has_more || cursor.is_none() {
                break;
            }
        }

        Ok(replies)
    }
}

#[async_trait]
impl IdentityResolver for SlackClient {
    async fn resolve_human(&self, id: &str) -> Result<String> {
        let body: UserInfoBody = self
            .get("users.info", &[("user", id.to_string())])
            .await
            .map_err(|reason| OrcaError::IdentityLookup {
                id: id.to_string(),
                reason,
            })?;

        let user = body.user.ok_or_else(|| OrcaError::IdentityLookup {
            id: id.to_string(),
            reason: "users.info returned no user".to_string(),
        })?;
        Ok(user.preferred_name())
    }

    async fn resolve_bot(&self, id: &str) -> Result<String> {
        let body: BotInfoBody = self
            .get("bots.info", &[("bot", id.to_string())])
            .await
            .map_err(|reason| OrcaError::IdentityLookup {
                id: id.to_string(),
                reason,
            })?;

        body.bot
            .map(|bot| bot.name)
            .ok_or_else(|| OrcaError::IdentityLookup {
                id: id.to_string(),
                reason: "bots.info returned no bot".to_string(),
            })
    }
}

#[async_trait]
impl Sender for SlackClient {
    async fn send(
        &self,
        channel: &str,
        chunks: &[String],
        thread_id: Option<&str>,
    ) -> Result<()> {
        if chunks.is_empty() {
            warn!(channel, "Refusing to post an empty message");
            return Ok(());
        }

        let channel_id = self.channel_id(channel).await?;
        let batches = chunks.len().div_ceil(MAX_BLOCKS_PER_MESSAGE);
        if batches > 1 {
            warn!(
                channel,
                sections = chunks.len(),
                batches,
                "Reply exceeds the block limit; posting it as several messages"
            );
        }

        for (batch, group) in chunks.chunks(MAX_BLOCKS_PER_MESSAGE).enumerate() {
            let mut payload = json!({
                "channel": channel_id,
                "text": group[0],
                "mrkdwn": true,
            });
            if group.len() > 1 {
                // One section per chunk; the first chunk doubles as notification text
                let blocks: Vec<Value> = group
                    .iter()
                    .enumerate()
                    .map(|(i, text)| {
                        json!({
                            "type": "section",
                            "block_id": i.to_string(),
                            "text": { "type": "mrkdwn", "text": text },
                        })
                    })
                    .collect();
                payload["blocks"] = Value::Array(blocks);
            }
            if let Some(thread_id) = thread_id {
                payload["thread_ts"] = Value::String(thread_id.to_string());
            }

            let posted: PostMessageBody =
                self.post("chat.postMessage", &payload)
                    .await
                    .map_err(|reason| OrcaError::Send {
                        channel: channel.to_string(),
                        reason,
                    })?;

            info!(
                channel,
                thread_id = thread_id.unwrap_or_default(),
                ts = posted.ts.as_deref().unwrap_or_default(),
                batch,
                sections = group.len(),
                "Posted message"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl DeletionSource for SlackClient {
    async fn delete(&self, channel: &str, message_id: &str) -> Result<()> {
        let channel_id = self.channel_id(channel).await?;
        let payload = json!({ "channel": channel_id, "ts": message_id });
        let _: Value = self
            .post("chat.delete", &payload)
            .await
            .map_err(|reason| OrcaError::Delete {
                message_id: message_id.to_string(),
                reason,
            })?;
        debug!(channel, ts = message_id, "Deleted message");
        Ok(())
    }
}

/// Truncate a response body for inclusion in an error message.
fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ResponseMetadata {
    fn next_cursor(&self) -> Option<String> {
        self.next_cursor
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToOwned::to_owned)
    }
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChannelListBody {
    #[serde(default)]
    channels: Vec<ChannelInfo>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

impl UserInfo {
    /// Display name, then real name, then the handle.
    fn preferred_name(self) -> String {
        let display = self
            .profile
            .and_then(|p| p.display_name)
            .filter(|name| !name.is_empty());
        display
            .or_else(|| self.real_name.filter(|name| !name.is_empty()))
            .unwrap_or(self.name)
    }
}

#[derive(Debug, Deserialize)]
struct UserInfoBody {
    #[serde(default)]
    user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct BotInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BotInfoBody {
    #[serde(default)]
    bot: Option<BotInfo>,
}

#[derive(Debug, Deserialize)]
struct PostMessageBody {
    #[serde(default)]
    ts: Option<String>,
}

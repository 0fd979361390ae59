//! Runbook discovery and retrieval.
//!
//! Grafana alerts carry a `runbook_url = <URL>` annotation. Runbooks hosted on
//! GitHub are fetched from `raw.githubusercontent.com` so the model sees the
//! markdown source rather than the rendered page.

use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::error::{OrcaError, Result};

/// Matches `runbook_url = <https://...>` with optional angle brackets and an
/// optional Slack link label (`<url|label>`).
static RUNBOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"runbook_url\s*=\s*<?(https?://[^\s>|]+)").expect("runbook regex is valid")
});

/// Limits for runbook retrieval.
#[derive(Debug, Clone)]
pub struct RunbookConfig {
    /// Max runbooks fetched per conversation.
    pub max_runbooks: usize,
    /// Timeout per fetch.
    pub timeout: Duration,
    /// Runbook text beyond this many characters is dropped.
    pub max_content_length: usize,
}

impl Default for RunbookConfig {
    fn default() -> Self {
        Self {
            max_runbooks: 3,
            timeout: Duration::from_secs(30),
            max_content_length: 50_000,
        }
    }
}

/// Every runbook URL in `text`, deduplicated, in order of appearance.
#[must_use]
pub fn extract_runbook_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for captures in RUNBOOK_URL.captures_iter(text) {
        let url = captures[1].to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Rewrite a `github.com/<owner>/<repo>/blob/<ref>/<path>` URL to its raw
/// content URL. Other URLs are returned unchanged.
#[must_use]
pub fn rewrite_github_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if url.host_str() != Some("github.com") {
        return raw.to_string();
    }

    let segments: Vec<String> = url
        .path_segments()
        .map(|s| s.map(str::to_string).collect())
        .unwrap_or_default();
    if segments.len() >= 3 && segments[2] == "blob" {
        let mut rewritten = vec![segments[0].clone(), segments[1].clone()];
        rewritten.push("refs".to_string());
        rewritten.push("heads".to_string());
        rewritten.extend(segments[3..].iter().cloned());
        url.set_path(&format!("/{}", rewritten.join("/")));
    }
    if url.set_host(Some("raw.githubusercontent.com")).is_err() {
        return raw.to_string();
    }
    url.to_string()
}

/// Fetches runbook text over HTTP.
pub struct RunbookFetcher {
    client: Client,
    config: RunbookConfig,
}

impl RunbookFetcher {
    /// Create a fetcher with the given limits.
    pub fn new(config: RunbookConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Fetch a single runbook.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let target = rewrite_github_url(url);
        let runbook_error = |reason: String| OrcaError::Runbook {
            url: target.clone(),
            reason,
        };

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| runbook_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(runbook_error(format!("HTTP {status}")));
        }
        let mut text = response
            .text()
            .await
            .map_err(|e| runbook_error(e.to_string()))?;

        if let Some((cut, _)) = text.char_indices().nth(self.config.max_content_length) {
            text.truncate(cut);
        }
        info!(url = %target, length = text.len(), "Retrieved runbook");
        Ok(text)
    }

    /// Fetch every runbook referenced in `text`. Failures are logged and
    /// skipped.
    pub async fn fetch_all(&self, text: &str) -> Vec<(String, String)> {
        let mut runbooks = Vec::new();
        for url in extract_runbook_urls(text)
            .into_iter()
            .take(self.config.max_runbooks)
        {
            match self.fetch(&url).await {
                Ok(body) => runbooks.push((url, body)),
                Err(e) => warn!(url, error = %e, "Failed to retrieve runbook"),
            }
        }
        runbooks
    }
}

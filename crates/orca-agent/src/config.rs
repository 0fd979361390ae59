//! Defaults shared by the CLI and the poll loop, plus timestamp parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{OrcaError, Result};

/// Default checkpoint file holding the watermark.
pub const DEFAULT_CHECKPOINT_FILE: &str = "last_check_time.txt";

/// Default channel where alerts are posted.
pub const DEFAULT_ALERT_CHANNEL: &str = "alerts";

/// Default Slack name of the alert source.
pub const DEFAULT_ALERT_USER: &str = "Grafana notifications";

/// Default Slack name the agent posts as.
pub const DEFAULT_AGENT_USER: &str = "orca-alerts";

/// Seconds between poll cycles.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Top-level messages requested per history fetch.
pub const DEFAULT_FETCH_LIMIT: usize = 100;

/// How far back the first cycle looks when there is no checkpoint.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Max size of a single Slack message section.
pub const MAX_CHUNK_SIZE: usize = 3000;

/// Parse an ISO-8601 date or datetime.
///
/// Accepts RFC 3339 (`2025-07-26T23:04:30.373719+00:00`), a naive datetime
/// (interpreted as UTC, with `T` or a space as separator) or a bare date
/// (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    // Space-separated form with offset, e.g. "2025-07-26 23:04:30.373719+00:00"
    if let Ok(ts) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(OrcaError::InvalidTimestamp {
        value: value.to_string(),
        reason: "expected an ISO-8601 date or datetime".to_string(),
    })
}

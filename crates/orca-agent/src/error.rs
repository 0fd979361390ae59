//! Error types for the alert responder.

use thiserror::Error;

/// Errors that can occur while polling, assembling, replying or checkpointing.
#[derive(Debug, Error)]
pub enum OrcaError {
    /// The feed provider reported a non-ok status
    #[error("Feed read failed: {0}")]
    FeedRead(String),

    /// The named channel is not visible to the bot token
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// A record carries neither a human nor a bot author
    #[error("Cannot resolve author of message {message_id}: {reason}")]
    IdentityResolution { message_id: String, reason: String },

    /// Looking up a user or bot name failed
    #[error("Identity lookup failed for {id}: {reason}")]
    IdentityLookup { id: String, reason: String },

    /// The persisted watermark could not be parsed
    #[error("Malformed checkpoint in {path}: {reason}")]
    CheckpointFormat { path: String, reason: String },

    /// The checkpoint file could not be read or written
    #[error("Checkpoint I/O failed for {path}: {reason}")]
    CheckpointIo { path: String, reason: String },

    /// Outbound delivery failed
    #[error("Send to channel {channel} failed: {reason}")]
    Send { channel: String, reason: String },

    /// Message deletion failed
    #[error("Delete of message {message_id} failed: {reason}")]
    Delete { message_id: String, reason: String },

    /// The reply generator (model call) failed
    #[error("Reply generation failed: {0}")]
    Generation(String),

    /// Runbook text could not be retrieved
    #[error("Failed to retrieve runbook from {url}: {reason}")]
    Runbook { url: String, reason: String },

    /// A timestamp could not be parsed
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrcaError>;

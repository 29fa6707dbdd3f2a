use thiserror::Error;

/// Errors raised by the channel layer.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel is not paired/connected. Callers treat this as "try later",
    /// never as a delivery failure.
    #[error("Channel not ready")]
    NotReady,

    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The session store could not be read or written.
    #[error("Session store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The persisted session snapshot is not valid JSON for [`crate::ChannelSession`].
    #[error("Corrupt session snapshot: {0}")]
    CorruptSession(#[from] serde_json::Error),

    /// The channel-specific configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChannelError {
    /// Whether the dispatcher should leave the reminder pending and retry on
    /// a later scan instead of recording a failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::NotReady)
    }
}

impl From<ChannelError> for duebell_core::DuebellError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Store(e) => duebell_core::DuebellError::Database(e.to_string()),
            ChannelError::ConfigError(msg) => duebell_core::DuebellError::Config(msg),
            other => duebell_core::DuebellError::Channel {
                channel: "whatsapp".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DuebellError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },
}

impl DuebellError {
    /// Short error code string returned to HTTP clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            DuebellError::Config(_) => "CONFIG_ERROR",
            DuebellError::InvalidContract(_) => "INVALID_CONTRACT",
            DuebellError::Database(_) => "DATABASE_ERROR",
            DuebellError::Channel { .. } => "CHANNEL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, DuebellError>;

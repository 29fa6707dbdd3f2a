use chrono::{NaiveDate, NaiveTime};
use duebell_channels::ChannelError;
use thiserror::Error;

/// Errors that can occur within the reminder scheduler and dispatcher.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The configured send time is not `HH:MM` (24-hour).
    #[error("Invalid send time: {0}")]
    InvalidSendTime(String),

    /// The configured timezone is not a known IANA zone name.
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The local date/time does not exist in the zone and no valid instant
    /// follows it closely enough (e.g. a day skipped by a zone change).
    #[error("No valid local time for {date} {time} in {tz}")]
    UnresolvableLocalTime {
        date: NaiveDate,
        time: NaiveTime,
        tz: String,
    },

    /// Advancing a billing cycle overflowed the supported date range.
    #[error("Due date out of range after {0}")]
    DateOutOfRange(NaiveDate),

    /// The contract handed to a lifecycle hook is unusable.
    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    /// The channel layer failed in a way the dispatcher cannot absorb
    /// (e.g. the session store is unreadable).
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl From<duebell_core::DuebellError> for SchedulerError {
    fn from(e: duebell_core::DuebellError) -> Self {
        match e {
            duebell_core::DuebellError::InvalidContract(msg) => SchedulerError::InvalidContract(msg),
            other => SchedulerError::InvalidContract(other.to_string()),
        }
    }
}

impl From<SchedulerError> for duebell_core::DuebellError {
    fn from(e: SchedulerError) -> Self {
        use duebell_core::DuebellError;
        match e {
            SchedulerError::Database(e) => DuebellError::Database(e.to_string()),
            SchedulerError::InvalidSendTime(_) | SchedulerError::InvalidTimezone(_) => {
                DuebellError::Config(e.to_string())
            }
            SchedulerError::InvalidContract(msg) => DuebellError::InvalidContract(msg),
            SchedulerError::UnresolvableLocalTime { .. } | SchedulerError::DateOutOfRange(_) => {
                DuebellError::InvalidContract(e.to_string())
            }
            SchedulerError::Channel(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Waiting for its scheduled_for time (or for the channel to come back).
    Pending,
    /// Accepted by the channel.
    Sent,
    /// Delivery was attempted and rejected, or the phone was unusable.
    Failed,
    /// Withdrawn because the contract was cancelled.
    Cancelled,
}

impl ReminderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Sent => "sent",
            ReminderStatus::Failed => "failed",
            ReminderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReminderStatus::Pending),
            "sent" => Ok(ReminderStatus::Sent),
            "failed" => Ok(ReminderStatus::Failed),
            "cancelled" => Ok(ReminderStatus::Cancelled),
            other => Err(format!("unknown reminder status: {other}")),
        }
    }
}

/// A persisted reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// UUIDv7 string, primary key, time-sortable.
    pub id: String,
    /// Owning contract. At most one `Pending` reminder exists per contract.
    pub contract_id: String,
    pub status: ReminderStatus,
    /// Absolute send instant derived from `due_date` in the configured zone.
    pub scheduled_for: DateTime<Utc>,
    /// Due date this reminder announces.
    pub due_date: NaiveDate,
    /// Raw phone copied from the contract; normalized at send time.
    pub recipient: String,
    pub client_name: String,
    /// Why delivery failed, when `status == Failed`.
    pub failure_reason: Option<String>,
    /// ISO-8601 timestamp of successful delivery, if any.
    pub sent_at: Option<String>,
    /// ISO-8601 timestamp of creation.
    pub created_at: String,
    /// ISO-8601 timestamp of the last update.
    pub updated_at: String,
}

/// Outcome counts of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Left pending because the channel was not ready.
    pub deferred: usize,
    /// Re-targeted or cancelled while the send was in flight; the outcome
    /// was not recorded against the edited row.
    pub superseded: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed + self.deferred + self.superseded
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duebell_channels::{normalize_phone, Channel, ChannelError, OutboundMessage, ReadinessProbe};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::Result,
    store::ReminderStore,
    types::{DispatchReport, Reminder},
};

/// Tunables for [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Prepended to phone numbers shorter than international length.
    pub default_country_code: String,
    /// A send that takes longer than this is recorded as failed.
    pub send_timeout: Duration,
    /// Pause between due-reminder scans in [`Dispatcher::run`].
    pub interval: Duration,
}

/// Sends due reminders through a [`Channel`] once the session is ready.
///
/// Channel unavailability is not a failure: reminders stay pending and are
/// picked up by the next scan. Only an unusable phone number, a rejected
/// send or a send timeout moves a reminder to `failed`. Outcomes are written
/// only if the reminder still targets the send time that was attempted.
pub struct Dispatcher {
    store: ReminderStore,
    readiness: Arc<dyn ReadinessProbe>,
    channel: Arc<dyn Channel>,
    settings: DispatchSettings,
}

enum Outcome {
    Sent,
    Failed,
    Deferred,
    Superseded,
}

impl Dispatcher {
    pub fn new(
        store: ReminderStore,
        readiness: Arc<dyn ReadinessProbe>,
        channel: Arc<dyn Channel>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            readiness,
            channel,
            settings,
        }
    }

    /// One pass over every reminder due at `as_of`.
    ///
    /// Errors reading or writing the reminder store, or reading the channel
    /// session, abort the pass and are returned unchanged.
    #[instrument(skip(self), fields(channel = self.channel.name()))]
    pub async fn dispatch_due(&self, as_of: DateTime<Utc>) -> Result<DispatchReport> {
        let due = self.store.due_reminders(as_of)?;
        let mut report = DispatchReport::default();
        if due.is_empty() {
            return Ok(report);
        }
        debug!(count = due.len(), "due reminders");

        for reminder in &due {
            match self.dispatch_one(reminder).await? {
                Outcome::Sent => report.sent += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Deferred => report.deferred += 1,
                Outcome::Superseded => report.superseded += 1,
            }
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            deferred = report.deferred,
            superseded = report.superseded,
            "dispatch pass complete"
        );
        Ok(report)
    }

    async fn dispatch_one(&self, reminder: &Reminder) -> Result<Outcome> {
        // Checked per reminder: the session can drop in the middle of a pass.
        if !self.readiness.is_ready()? {
            debug!(reminder_id = %reminder.id, "channel not ready, leaving pending");
            return Ok(Outcome::Deferred);
        }

        let address = match normalize_phone(&reminder.recipient, &self.settings.default_country_code)
        {
            Ok(a) => a,
            Err(e) => {
                warn!(reminder_id = %reminder.id, error = %e, "unusable phone number");
                return self.record_failure(reminder, &e.to_string());
            }
        };

        let msg = reminder_message(reminder);
        let timeout_ms = self.settings.send_timeout.as_millis() as u64;
        let sent = tokio::time::timeout(self.settings.send_timeout, self.channel.send(&address, &msg))
            .await
            .unwrap_or(Err(ChannelError::Timeout { ms: timeout_ms }));

        match sent {
            Ok(()) => {
                if self.store.mark_sent(reminder, Utc::now())? {
                    info!(reminder_id = %reminder.id, to = %address, "reminder sent");
                    Ok(Outcome::Sent)
                } else {
                    warn!(
                        reminder_id = %reminder.id,
                        "reminder edited or cancelled during send; delivery not recorded"
                    );
                    Ok(Outcome::Superseded)
                }
            }
            Err(e) if e.is_retryable() => {
                debug!(reminder_id = %reminder.id, "channel reported not ready, leaving pending");
                Ok(Outcome::Deferred)
            }
            Err(e) => {
                warn!(reminder_id = %reminder.id, to = %address, error = %e, "reminder send failed");
                self.record_failure(reminder, &e.to_string())
            }
        }
    }

    fn record_failure(&self, reminder: &Reminder, reason: &str) -> Result<Outcome> {
        if self.store.mark_failed(reminder, reason, Utc::now())? {
            Ok(Outcome::Failed)
        } else {
            debug!(reminder_id = %reminder.id, "reminder edited or cancelled during send; failure not recorded");
            Ok(Outcome::Superseded)
        }
    }

    /// Scan loop. Runs until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.settings.interval.as_secs(), "reminder dispatcher started");
        self.log_overdue_on_startup();

        let mut interval = tokio::time::interval(self.settings.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_due(Utc::now()).await {
                        error!("dispatch pass failed: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("reminder dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Reminders that came due while the process was down are still sent
    /// (the first tick fires immediately); this only makes the backlog visible.
    fn log_overdue_on_startup(&self) {
        match self.store.count_overdue(Utc::now()) {
            Ok(n) if n > 0 => warn!(count = n, "overdue pending reminders at startup"),
            Err(e) => error!("overdue-on-startup query failed: {e}"),
            _ => {}
        }
    }
}

/// Plain reminder text. Templating is left to the bridge.
pub fn reminder_message(reminder: &Reminder) -> OutboundMessage {
    OutboundMessage {
        body: format!(
            "Hello {}, this is a reminder that your payment is due on {}.",
            reminder.client_name,
            reminder.due_date.format("%Y-%m-%d")
        ),
        reference: Some(reminder.id.clone()),
    }
}

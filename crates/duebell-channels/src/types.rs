use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Connection state of the WhatsApp session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No live session. Initial state.
    #[default]
    Disconnected,
    /// A QR code has been issued and is waiting to be scanned.
    Pending,
    /// Paired and able to send.
    Ready,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Pending => "pending",
            SessionStatus::Ready => "ready",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disconnected" => Ok(SessionStatus::Disconnected),
            "pending" => Ok(SessionStatus::Pending),
            "ready" => Ok(SessionStatus::Ready),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// Lifecycle event reported by the external WhatsApp client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A new pairing QR code was generated.
    Qr { qr: String },
    /// Authentication succeeded; the client can send.
    Ready,
    /// The client lost its session (logout, ban, QR expiry, network).
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ChannelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::Qr { .. } => "qr",
            ChannelEvent::Ready => "ready",
            ChannelEvent::Disconnected { .. } => "disconnected",
        }
    }
}

/// The persisted channel session snapshot. There is exactly one per store.
///
/// Invariant: `qr` and `qr_generated_at` are `Some` only while
/// `status == Pending`. Every transition goes through [`ChannelSession::apply`],
/// which rewrites the affected fields together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSession {
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub qr_generated_at: Option<DateTime<Utc>>,
    /// Most recent successful pairing. Never cleared.
    #[serde(default)]
    pub last_ready_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_disconnected_at: Option<DateTime<Utc>>,
    /// Last non-empty reason reported with a disconnect.
    #[serde(default)]
    pub last_disconnect_reason: Option<String>,
}

impl ChannelSession {
    /// Apply one lifecycle event, mutating the snapshot in place.
    ///
    /// Fields are cleared before new values are set so no intermediate mix of
    /// old and new state survives a transition.
    pub fn apply(&mut self, event: &ChannelEvent, now: DateTime<Utc>) {
        match event {
            ChannelEvent::Qr { qr } => {
                // A fresh pairing attempt wipes the previous failure.
                self.last_disconnect_reason = None;
                self.last_disconnected_at = None;
                self.qr = Some(qr.clone());
                self.qr_generated_at = Some(now);
                self.status = SessionStatus::Pending;
            }
            ChannelEvent::Ready => {
                self.qr = None;
                self.qr_generated_at = None;
                self.status = SessionStatus::Ready;
                self.last_ready_at = Some(now);
            }
            ChannelEvent::Disconnected { reason } => {
                self.qr = None;
                self.qr_generated_at = None;
                self.status = SessionStatus::Disconnected;
                self.last_disconnected_at = Some(now);
                // A reason-less disconnect keeps the previous reason.
                if let Some(r) = reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                    self.last_disconnect_reason = Some(r.to_string());
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    /// Shape served to the status endpoint.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status.to_string(),
            qr: self.qr.clone(),
            generated_at: self.qr_generated_at.map(iso),
            last_ready_at: self.last_ready_at.map(iso),
            last_disconnected_at: self.last_disconnected_at.map(iso),
            last_disconnect_reason: self.last_disconnect_reason.clone(),
        }
    }
}

/// Read-only view of the session for UIs and status endpoints.
///
/// Every field except `status` is nullable; timestamps are RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: String,
    pub qr: Option<String>,
    pub generated_at: Option<String>,
    pub last_ready_at: Option<String>,
    pub last_disconnected_at: Option<String>,
    pub last_disconnect_reason: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        ChannelSession::default().snapshot()
    }
}

/// A message to be delivered through a [`crate::Channel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Text to deliver.
    pub body: String,
    /// Caller-side identifier (the reminder id) the bridge can use to drop
    /// duplicate deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

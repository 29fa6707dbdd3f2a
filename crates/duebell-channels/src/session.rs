use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    channel::ReadinessProbe,
    error::Result,
    store::SessionStore,
    types::{ChannelEvent, ChannelSession, SessionSnapshot, SessionStatus},
};

/// Drives the persisted [`ChannelSession`] from inbound client events.
///
/// ```text
/// disconnected --qr--> pending --ready--> ready
///      ^                  |                 |
///      +---disconnected---+---disconnected--+
/// ```
///
/// Each transition is a single get → apply → put under `transition_lock`, so
/// concurrent events never interleave field by field and no reader observes,
/// say, `ready` next to a stale QR code.
pub struct ChannelStateMachine<S> {
    store: S,
    transition_lock: Mutex<()>,
}

impl<S: SessionStore> ChannelStateMachine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            transition_lock: Mutex::new(()),
        }
    }

    /// Current snapshot; no side effects.
    pub fn session(&self) -> Result<ChannelSession> {
        self.store.get()
    }

    /// Snapshot in the shape served by the status endpoint.
    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        Ok(self.store.get()?.snapshot())
    }

    pub fn is_ready(&self) -> Result<bool> {
        Ok(self.store.get()?.is_ready())
    }

    /// A pairing QR code was issued. Wipes any recorded disconnect.
    pub fn on_qr_issued(&self, qr: &str) -> Result<ChannelSession> {
        self.apply(ChannelEvent::Qr { qr: qr.to_string() })
    }

    /// The client authenticated and can send.
    pub fn on_ready(&self) -> Result<ChannelSession> {
        self.apply(ChannelEvent::Ready)
    }

    /// The client lost its session. An empty or missing `reason` leaves the
    /// previously recorded reason in place.
    pub fn on_disconnected(&self, reason: Option<&str>) -> Result<ChannelSession> {
        self.apply(ChannelEvent::Disconnected {
            reason: reason.map(str::to_string),
        })
    }

    pub fn apply(&self, event: ChannelEvent) -> Result<ChannelSession> {
        self.apply_at(event, Utc::now())
    }

    /// Apply `event` as if it happened at `now` and persist the result.
    ///
    /// A store failure is returned as-is; the previous snapshot stays in place.
    pub fn apply_at(&self, event: ChannelEvent, now: DateTime<Utc>) -> Result<ChannelSession> {
        let _guard = self
            .transition_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut session = self.store.get()?;
        let from = session.status;
        session.apply(&event, now);
        self.store.put(&session)?;

        match &event {
            ChannelEvent::Disconnected { .. } => warn!(
                event = event.name(),
                %from,
                reason = session.last_disconnect_reason.as_deref().unwrap_or(""),
                "whatsapp session disconnected"
            ),
            _ if from == session.status && from == SessionStatus::Pending => {
                info!(event = event.name(), "whatsapp QR refreshed")
            }
            _ => info!(event = event.name(), %from, to = %session.status, "whatsapp session transition"),
        }

        Ok(session)
    }
}

impl<S: SessionStore> ReadinessProbe for ChannelStateMachine<S> {
    fn is_ready(&self) -> Result<bool> {
        ChannelStateMachine::is_ready(self)
    }
}

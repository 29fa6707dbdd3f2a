//! `duebell-channels`: delivery-channel plumbing for reminder dispatch.
//!
//! The WhatsApp client lives outside this process and reports its connection
//! lifecycle as `qr` / `ready` / `disconnected` events. Those events drive the
//! [`ChannelStateMachine`], which persists a single [`ChannelSession`] snapshot
//! through a [`SessionStore`]. The dispatcher only sends when the machine says
//! the channel is ready.

pub mod channel;
pub mod db;
pub mod error;
pub mod phone;
pub mod session;
pub mod store;
pub mod types;

pub use channel::{Channel, ReadinessProbe};
pub use error::{ChannelError, Result};
pub use phone::{normalize_phone, ChannelAddress, InvalidPhoneError};
pub use session::ChannelStateMachine;
pub use store::{MemorySessionStore, SessionStore, SqliteSessionStore};
pub use types::{ChannelEvent, ChannelSession, OutboundMessage, SessionSnapshot, SessionStatus};

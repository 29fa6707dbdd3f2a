use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::{db::init_db, error::Result, types::ChannelSession};

/// Key the WhatsApp session snapshot is stored under.
pub const WHATSAPP_SESSION_KEY: &str = "whatsapp.session";

/// Durable home of the single [`ChannelSession`] snapshot.
///
/// `get` never fails for a missing entry; it yields the default
/// (disconnected, everything else unset). `put` replaces the whole snapshot
/// in one write. Callers that need read-modify-write atomicity serialize
/// around the pair themselves (see [`crate::ChannelStateMachine`]).
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<ChannelSession>;
    fn put(&self, session: &ChannelSession) -> Result<()>;
}

/// SQLite-backed store; survives process restarts.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    key: String,
}

impl SqliteSessionStore {
    /// Wrap `conn`, creating the schema if needed, keyed at [`WHATSAPP_SESSION_KEY`].
    pub fn new(conn: Connection) -> Result<Self> {
        Self::with_key(conn, WHATSAPP_SESSION_KEY)
    }

    pub fn with_key(conn: Connection, key: impl Into<String>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: key.into(),
        })
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self), fields(key = %self.key))]
    fn get(&self) -> Result<ChannelSession> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM channel_state WHERE key = ?1",
                [&self.key],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => {
                debug!("no stored session, using default");
                Ok(ChannelSession::default())
            }
        }
    }

    #[instrument(skip(self, session), fields(key = %self.key, status = %session.status))]
    fn put(&self, session: &ChannelSession) -> Result<()> {
        let json = serde_json::to_string(session)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO channel_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            rusqlite::params![self.key, json, now],
        )?;
        Ok(())
    }
}

/// In-process store for tests and runs without a database.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<ChannelSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<ChannelSession> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn put(&self, session: &ChannelSession) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ChannelError, types::SessionStatus};
    use chrono::TimeZone;

    fn sqlite() -> SqliteSessionStore {
        SqliteSessionStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn sample() -> ChannelSession {
        ChannelSession {
            status: SessionStatus::Disconnected,
            qr: None,
            qr_generated_at: None,
            last_ready_at: Some(Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap()),
            last_disconnected_at: Some(Utc.with_ymd_and_hms(2026, 1, 6, 9, 30, 0).unwrap()),
            last_disconnect_reason: Some("LOGOUT".to_string()),
        }
    }

    #[test]
    fn sqlite_get_defaults_when_empty() {
        assert_eq!(sqlite().get().unwrap(), ChannelSession::default());
    }

    #[test]
    fn sqlite_put_replaces_whole_snapshot() {
        let store = sqlite();
        store.put(&sample()).unwrap();
        assert_eq!(store.get().unwrap(), sample());

        let replaced = ChannelSession::default();
        store.put(&replaced).unwrap();
        assert_eq!(store.get().unwrap(), replaced);
    }

    #[test]
    fn sqlite_keys_are_independent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute(
            "INSERT INTO channel_state (key, value, updated_at) VALUES ('other', '{\"status\":\"ready\"}', '')",
            [],
        )
        .unwrap();
        let store = SqliteSessionStore::new(conn).unwrap();
        assert_eq!(store.get().unwrap().status, SessionStatus::Disconnected);
    }

    #[test]
    fn sqlite_corrupt_value_surfaces_as_error() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute(
            "INSERT INTO channel_state (key, value, updated_at) VALUES (?1, 'not json', '')",
            [WHATSAPP_SESSION_KEY],
        )
        .unwrap();
        let store = SqliteSessionStore::new(conn).unwrap();
        assert!(matches!(store.get(), Err(ChannelError::CorruptSession(_))));
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get().unwrap(), ChannelSession::default());
        store.put(&sample()).unwrap();
        assert_eq!(store.get().unwrap(), sample());
    }
}

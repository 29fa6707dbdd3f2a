use rusqlite::Connection;

use crate::error::Result;

/// Initialise the channel state schema in `conn`.
///
/// `channel_state` is a plain key/value table: one row per channel session,
/// the value being the JSON-encoded [`crate::ChannelSession`]. Rows never
/// expire; transitions overwrite them in place.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS channel_state (
            key         TEXT NOT NULL PRIMARY KEY,
            value       TEXT NOT NULL,   -- JSON-encoded ChannelSession
            updated_at  TEXT NOT NULL    -- ISO-8601
        ) STRICT;
        ",
    )?;
    Ok(())
}

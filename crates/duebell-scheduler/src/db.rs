use rusqlite::Connection;

use crate::error::Result;

/// Initialise the reminder schema in `conn`.
///
/// The partial unique index is what guarantees a contract never has two
/// pending reminders, even if a writer bypasses [`crate::ReminderStore`].
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS reminders (
            id              TEXT NOT NULL PRIMARY KEY,
            contract_id     TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            scheduled_for   TEXT NOT NULL,   -- RFC 3339, UTC, second precision
            due_date        TEXT NOT NULL,   -- YYYY-MM-DD
            recipient       TEXT NOT NULL,
            client_name     TEXT NOT NULL,
            failure_reason  TEXT,
            sent_at         TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        ) STRICT;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_reminders_one_pending
            ON reminders (contract_id) WHERE status = 'pending';

        -- Due scan: WHERE status = 'pending' AND scheduled_for <= ?
        CREATE INDEX IF NOT EXISTS idx_reminders_due
            ON reminders (status, scheduled_for);
        ",
    )?;
    Ok(())
}

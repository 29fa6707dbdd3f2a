use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use duebell_core::Contract;
use rusqlite::{types::Type, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::Result,
    types::{Reminder, ReminderStatus},
};

const REMINDER_COLUMNS: &str = "id, contract_id, status, scheduled_for, due_date, recipient,
     client_name, failure_reason, sent_at, created_at, updated_at";

/// Result of a serialized find-or-insert on a contract's pending reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Created(Reminder),
    Updated(Reminder),
    /// A reminder for this due date already left `pending` (sent, failed
    /// or cancelled); it is returned as-is and nothing is re-armed.
    Unchanged(Reminder),
}

impl Upsert {
    pub fn reminder(&self) -> &Reminder {
        match self {
            Upsert::Created(r) | Upsert::Updated(r) | Upsert::Unchanged(r) => r,
        }
    }

    pub fn into_reminder(self) -> Reminder {
        match self {
            Upsert::Created(r) | Upsert::Updated(r) | Upsert::Unchanged(r) => r,
        }
    }
}

/// SQLite persistence for reminders.
///
/// Cheap to clone; clones share one connection. Every method holds the
/// connection lock for its whole duration, and the pending-reminder writes
/// additionally run inside `BEGIN IMMEDIATE`, so find-then-write on a
/// contract is serialized both within this process and against other
/// writers of the same database file.
#[derive(Clone)]
pub struct ReminderStore {
    conn: Arc<Mutex<Connection>>,
}

impl ReminderStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `scheduled_for` the pending reminder for `contract`.
    ///
    /// Keyed on `(contract.id, contract.due_date)`: if a reminder for that
    /// due date already exists and is no longer pending, it is returned
    /// untouched. Otherwise the contract's pending row is updated, or a new
    /// one inserted.
    #[instrument(skip(self, contract), fields(contract_id = %contract.id))]
    pub fn upsert_pending(
        &self,
        contract: &Contract,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Upsert> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = settled_for_due_date(&tx, &contract.id, contract.due_date)? {
            debug!(reminder_id = %existing.id, status = %existing.status, "due date already handled");
            return Ok(Upsert::Unchanged(existing));
        }

        let result = match pending_id(&tx, &contract.id)? {
            Some(id) => {
                update_pending(&tx, &id, contract, contract.due_date, scheduled_for)?;
                Upsert::Updated(fetch(&tx, &id)?)
            }
            None => {
                let id = insert_pending(&tx, contract, contract.due_date, scheduled_for)?;
                Upsert::Created(fetch(&tx, &id)?)
            }
        };
        tx.commit()?;
        Ok(result)
    }

    /// Re-target the contract's pending reminder. `None` when it has none.
    #[instrument(skip(self, contract), fields(contract_id = %contract.id))]
    pub fn reschedule_pending(
        &self,
        contract: &Contract,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Option<Reminder>> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(id) = pending_id(&tx, &contract.id)? else {
            debug!("no pending reminder to reschedule");
            return Ok(None);
        };
        update_pending(&tx, &id, contract, contract.due_date, scheduled_for)?;
        let reminder = fetch(&tx, &id)?;
        tx.commit()?;
        Ok(Some(reminder))
    }

    /// Insert a pending reminder for `due_date` unless the contract already
    /// has a pending one, or any reminder for that same due date. `None`
    /// when nothing was inserted.
    #[instrument(skip(self, contract), fields(contract_id = %contract.id))]
    pub fn insert_pending_if_absent(
        &self,
        contract: &Contract,
        due_date: NaiveDate,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Option<Reminder>> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if pending_id(&tx, &contract.id)?.is_some()
            || settled_for_due_date(&tx, &contract.id, due_date)?.is_some()
        {
            return Ok(None);
        }
        let id = insert_pending(&tx, contract, due_date, scheduled_for)?;
        let reminder = fetch(&tx, &id)?;
        tx.commit()?;
        Ok(Some(reminder))
    }

    /// Cancel the contract's pending reminder. Returns the number of rows
    /// changed (0 or 1).
    #[instrument(skip(self))]
    pub fn cancel_pending(&self, contract_id: &str) -> Result<usize> {
        let now = now_str();
        let n = self.lock().execute(
            "UPDATE reminders SET status = 'cancelled', updated_at = ?1
             WHERE contract_id = ?2 AND status = 'pending'",
            rusqlite::params![now, contract_id],
        )?;
        Ok(n)
    }

    /// Pending reminders whose send time is at or before `as_of`, oldest first.
    #[instrument(skip(self))]
    pub fn due_reminders(&self, as_of: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE status = 'pending' AND scheduled_for <= ?1
             ORDER BY scheduled_for, id"
        ))?;
        let reminders = stmt
            .query_map([instant_str(as_of)], row_to_reminder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reminders)
    }

    /// Number of pending reminders already past their send time.
    pub fn count_overdue(&self, as_of: DateTime<Utc>) -> Result<usize> {
        let n: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM reminders WHERE status = 'pending' AND scheduled_for <= ?1",
            [instant_str(as_of)],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    pub fn get(&self, id: &str) -> Result<Option<Reminder>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                [id],
                row_to_reminder,
            )
            .optional()?)
    }

    pub fn pending_for_contract(&self, contract_id: &str) -> Result<Option<Reminder>> {
        let conn = self.lock();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {REMINDER_COLUMNS} FROM reminders
                     WHERE contract_id = ?1 AND status = 'pending'"
                ),
                [contract_id],
                row_to_reminder,
            )
            .optional()?)
    }

    /// Every reminder ever created for a contract, oldest first.
    pub fn list_for_contract(&self, contract_id: &str) -> Result<Vec<Reminder>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE contract_id = ?1 ORDER BY created_at, id"
        ))?;
        let reminders = stmt
            .query_map([contract_id], row_to_reminder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reminders)
    }

    /// Record a successful delivery of `attempted`.
    ///
    /// Only applies while the row is still pending *and* still targets the
    /// send instant that was attempted. `false` if it was cancelled or
    /// re-targeted while the send was in flight; the re-targeted row stays
    /// pending for its new date.
    #[instrument(skip(self, attempted), fields(reminder_id = %attempted.id))]
    pub fn mark_sent(&self, attempted: &Reminder, at: DateTime<Utc>) -> Result<bool> {
        let at = instant_str(at);
        let n = self.lock().execute(
            "UPDATE reminders SET status = 'sent', sent_at = ?1, updated_at = ?1
             WHERE id = ?2 AND status = 'pending' AND scheduled_for = ?3",
            rusqlite::params![at, attempted.id, instant_str(attempted.scheduled_for)],
        )?;
        Ok(n == 1)
    }

    /// Record a non-retryable delivery failure. Same guard as
    /// [`ReminderStore::mark_sent`].
    #[instrument(skip(self, attempted), fields(reminder_id = %attempted.id))]
    pub fn mark_failed(&self, attempted: &Reminder, reason: &str, at: DateTime<Utc>) -> Result<bool> {
        let n = self.lock().execute(
            "UPDATE reminders SET status = 'failed', failure_reason = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'pending' AND scheduled_for = ?4",
            rusqlite::params![
                reason,
                instant_str(at),
                attempted.id,
                instant_str(attempted.scheduled_for)
            ],
        )?;
        Ok(n == 1)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn pending_id(conn: &Connection, contract_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM reminders WHERE contract_id = ?1 AND status = 'pending'",
        [contract_id],
        |row| row.get(0),
    )
    .optional()
}

/// Most recent non-pending reminder of `contract_id` for `due_date`.
///
/// A pending row for the same date is not "settled": it is still the
/// contract's live reminder and gets re-targeted instead.
fn settled_for_due_date(
    conn: &Connection,
    contract_id: &str,
    due_date: NaiveDate,
) -> rusqlite::Result<Option<Reminder>> {
    let has_pending_for_date: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM reminders
                        WHERE contract_id = ?1 AND due_date = ?2 AND status = 'pending')",
        rusqlite::params![contract_id, due_date.to_string()],
        |row| row.get(0),
    )?;
    if has_pending_for_date {
        return Ok(None);
    }
    conn.query_row(
        &format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders
             WHERE contract_id = ?1 AND due_date = ?2
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ),
        rusqlite::params![contract_id, due_date.to_string()],
        row_to_reminder,
    )
    .optional()
}

fn insert_pending(
    conn: &Connection,
    contract: &Contract,
    due_date: NaiveDate,
    scheduled_for: DateTime<Utc>,
) -> rusqlite::Result<String> {
    let id = Uuid::now_v7().to_string();
    let now = now_str();
    conn.execute(
        "INSERT INTO reminders
         (id, contract_id, status, scheduled_for, due_date, recipient, client_name,
          failure_reason, sent_at, created_at, updated_at)
         VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, NULL, NULL, ?7, ?7)",
        rusqlite::params![
            id,
            contract.id,
            instant_str(scheduled_for),
            due_date.to_string(),
            contract.phone,
            contract.client_name,
            now
        ],
    )?;
    info!(reminder_id = %id, contract_id = %contract.id, %scheduled_for, "reminder created");
    Ok(id)
}

fn update_pending(
    conn: &Connection,
    id: &str,
    contract: &Contract,
    due_date: NaiveDate,
    scheduled_for: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE reminders
         SET scheduled_for = ?1, due_date = ?2, recipient = ?3, client_name = ?4,
             updated_at = ?5
         WHERE id = ?6 AND status = 'pending'",
        rusqlite::params![
            instant_str(scheduled_for),
            due_date.to_string(),
            contract.phone,
            contract.client_name,
            now_str(),
            id
        ],
    )?;
    info!(reminder_id = %id, contract_id = %contract.id, %scheduled_for, "reminder rescheduled");
    Ok(())
}

fn fetch(conn: &Connection, id: &str) -> rusqlite::Result<Reminder> {
    conn.query_row(
        &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
        [id],
        row_to_reminder,
    )
}

/// Fixed-width UTC form so that string comparison in SQL matches time order.
fn instant_str(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn now_str() -> String {
    Utc::now().to_rfc3339()
}

fn conversion_error(col: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, msg.into())
}

/// Map a SQLite row to a `Reminder`.
fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let status: String = row.get(2)?;
    let scheduled_for: String = row.get(3)?;
    let due_date: String = row.get(4)?;

    Ok(Reminder {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        status: status
            .parse::<ReminderStatus>()
            .map_err(|e| conversion_error(2, e))?,
        scheduled_for: DateTime::parse_from_rfc3339(&scheduled_for)
            .map_err(|e| conversion_error(3, format!("{scheduled_for:?}: {e}")))?
            .with_timezone(&Utc),
        due_date: due_date
            .parse::<NaiveDate>()
            .map_err(|e| conversion_error(4, format!("{due_date:?}: {e}")))?,
        recipient: row.get(5)?,
        client_name: row.get(6)?,
        failure_reason: row.get(7)?,
        sent_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

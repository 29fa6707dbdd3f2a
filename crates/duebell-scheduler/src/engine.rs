use chrono::NaiveDate;
use duebell_core::Contract;
use tracing::{debug, info, instrument};

use crate::{
    error::{Result, SchedulerError},
    schedule::SendWindow,
    store::{ReminderStore, Upsert},
    types::Reminder,
};

/// Derives reminder send times from contract due dates and keeps the
/// one-pending-reminder-per-contract invariant.
///
/// All writes go through [`ReminderStore`]'s serialized transactions; this
/// type only decides *when* and *whether*.
#[derive(Clone)]
pub struct ReminderScheduler {
    store: ReminderStore,
    window: SendWindow,
}

impl ReminderScheduler {
    pub fn new(store: ReminderStore, window: SendWindow) -> Self {
        Self { store, window }
    }

    pub fn store(&self) -> &ReminderStore {
        &self.store
    }

    pub fn window(&self) -> SendWindow {
        self.window
    }

    /// Create the pending reminder for a newly created contract.
    ///
    /// Replay-safe: if the contract already has a pending reminder, that
    /// reminder is re-targeted instead of a second one being inserted; if a
    /// reminder for this due date was already sent, failed or cancelled, it
    /// is returned unchanged.
    #[instrument(skip(self, contract), fields(contract_id = %contract.id, due = %contract.due_date))]
    pub fn schedule_for(&self, contract: &Contract) -> Result<Reminder> {
        contract.validate()?;
        let at = self.window.scheduled_for(contract.due_date)?;
        let upsert = self.store.upsert_pending(contract, at)?;
        match &upsert {
            Upsert::Updated(r) => {
                info!(reminder_id = %r.id, "contract already had a pending reminder, re-targeted")
            }
            Upsert::Unchanged(r) => {
                info!(reminder_id = %r.id, status = %r.status, "reminder for this due date already settled")
            }
            Upsert::Created(_) => {}
        }
        Ok(upsert.into_reminder())
    }

    /// Re-target the contract's pending reminder at its new due date.
    ///
    /// Returns `Ok(None)` and changes nothing when no reminder is pending
    /// (already sent, failed or cancelled): a due-date edit alone never
    /// creates a reminder.
    #[instrument(skip(self, contract), fields(contract_id = %contract.id, due = %contract.due_date))]
    pub fn reschedule_on_due_date_change(&self, contract: &Contract) -> Result<Option<Reminder>> {
        contract.validate()?;
        let at = self.window.scheduled_for(contract.due_date)?;
        let updated = self.store.reschedule_pending(contract, at)?;
        if updated.is_none() {
            debug!("due date changed but nothing pending; leaving history untouched");
        }
        Ok(updated)
    }

    /// Lifecycle hook: contract created.
    pub fn on_contract_created(&self, contract: &Contract) -> Result<Reminder> {
        self.schedule_for(contract)
    }

    /// Lifecycle hook: contract due date mutated.
    pub fn on_contract_due_date_changed(&self, contract: &Contract) -> Result<Option<Reminder>> {
        self.reschedule_on_due_date_change(contract)
    }

    /// Lifecycle hook: contract cancelled. Withdraws the pending reminder.
    #[instrument(skip(self))]
    pub fn cancel_pending(&self, contract_id: &str) -> Result<usize> {
        let n = self.store.cancel_pending(contract_id)?;
        if n > 0 {
            info!(count = n, "pending reminder cancelled");
        }
        Ok(n)
    }

    /// Advance the contract one billing cycle and schedule the reminder for
    /// the resulting due date.
    ///
    /// Returns the next due date together with the new reminder, or `None`
    /// in its place when the contract still has a pending reminder (the
    /// current cycle has not been dispatched yet).
    #[instrument(skip(self, contract), fields(contract_id = %contract.id, cycle = %contract.billing_cycle))]
    pub fn schedule_next_cycle(&self, contract: &Contract) -> Result<(NaiveDate, Option<Reminder>)> {
        contract.validate()?;
        let next_due = contract
            .billing_cycle
            .next_due_date(contract.due_date)
            .ok_or(SchedulerError::DateOutOfRange(contract.due_date))?;
        let at = self.window.scheduled_for(next_due)?;
        let created = self.store.insert_pending_if_absent(contract, next_due, at)?;
        match &created {
            Some(r) => info!(reminder_id = %r.id, %next_due, "next cycle scheduled"),
            None => debug!(%next_due, "current cycle still pending; next cycle not scheduled"),
        }
        Ok((next_due, created))
    }
}

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DuebellError, Result};

/// How often a contract bills. Each cycle yields exactly one next due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Semiannual,
    Yearly,
}

impl BillingCycle {
    /// Due date one cycle after `due`.
    ///
    /// Month-based cycles clamp to the last day of shorter months
    /// (Jan 31 + monthly = Feb 28, or Feb 29 in leap years).
    /// Returns `None` only if the result falls outside chrono's date range.
    pub fn next_due_date(self, due: NaiveDate) -> Option<NaiveDate> {
        match self {
            BillingCycle::Weekly => due.checked_add_days(Days::new(7)),
            BillingCycle::Biweekly => due.checked_add_days(Days::new(14)),
            BillingCycle::Monthly => due.checked_add_months(Months::new(1)),
            BillingCycle::Quarterly => due.checked_add_months(Months::new(3)),
            BillingCycle::Semiannual => due.checked_add_months(Months::new(6)),
            BillingCycle::Yearly => due.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillingCycle::Weekly => "weekly",
            BillingCycle::Biweekly => "biweekly",
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Semiannual => "semiannual",
            BillingCycle::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

/// The slice of a billing contract the reminder engine needs.
///
/// Contracts are owned by the external persistence layer; this is what its
/// lifecycle hooks hand over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Stable identifier assigned by the owning system.
    pub id: String,
    /// Display name of the client, carried into the reminder text.
    pub client_name: String,
    /// Phone number exactly as the client supplied it.
    pub phone: String,
    /// Calendar date the next payment is due (no time component).
    pub due_date: NaiveDate,
    pub billing_cycle: BillingCycle,
}

impl Contract {
    /// Reject contracts the scheduler cannot key reminders on.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DuebellError::InvalidContract(
                "contract id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

//! `duebell-scheduler`: billing-contract reminders with SQLite persistence.
//!
//! # Overview
//!
//! Contract lifecycle hooks feed the [`ReminderScheduler`], which turns a
//! contract's due date into a `scheduled_for` instant (civil time in the
//! configured zone) and keeps exactly one pending reminder per contract.
//! The [`Dispatcher`] scans for due reminders and sends them through a
//! [`duebell_channels::Channel`] whenever the WhatsApp session is ready.
//!
//! # Reminder states
//!
//! | State       | Entered when                                        |
//! |-------------|-----------------------------------------------------|
//! | `pending`   | Contract created, or next billing cycle scheduled   |
//! | `sent`      | Channel accepted the message                        |
//! | `failed`    | Bad phone number, send rejected, or send timed out  |
//! | `cancelled` | Contract cancelled                                  |

pub mod db;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod store;
pub mod types;

pub use dispatch::{DispatchSettings, Dispatcher};
pub use engine::ReminderScheduler;
pub use error::{Result, SchedulerError};
pub use schedule::SendWindow;
pub use store::{ReminderStore, Upsert};
pub use types::{DispatchReport, Reminder, ReminderStatus};

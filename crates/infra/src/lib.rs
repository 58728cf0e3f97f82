//! Bill runtime: actors, checkpoint journal, registry and configuration.

pub mod actor;
pub mod config;
pub mod error;
pub mod journal;
pub mod registry;

pub use actor::{BILL_AGGREGATE_TYPE, BillActor, BillHandle, BillRequest};
pub use config::BillingConfig;
pub use error::BillingError;
pub use journal::{EventJournal, InMemoryJournal, JournalError, StoredEvent, UncommittedEvent};
pub use registry::{BillRegistry, BillStatusFilter};

//! `tally-core`: domain building blocks shared by the bill crates.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).
//! Time is the one outside input the domain needs, and it enters through the
//! [`Clock`] capability rather than a global wall-clock read.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, EventId};
pub use value_object::ValueObject;

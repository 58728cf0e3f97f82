//! Append-only checkpoint journal for bill actors.
//!
//! Each bill actor records every accepted transition here before making it
//! visible to readers. The journal stands in for the durable-execution
//! substrate's checkpoint store; it provides ordering and replay, not
//! durability.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryJournal;
pub use r#trait::{EventJournal, JournalError, StoredEvent, UncommittedEvent};

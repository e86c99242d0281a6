//! Append-only event store boundary.
//!
//! One stream per ledger; streams are keyed by `LedgerId`.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

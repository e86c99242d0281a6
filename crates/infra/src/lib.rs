//! Infrastructure layer: clock, value transfer, event store and the ledger service.

pub mod clock;
pub mod event_store;
pub mod service;
pub mod transfer;


pub use clock::{Clock, ManualClock, SystemClock};
pub use service::{DispatchError, LedgerService, Receipt};
pub use transfer::{InMemoryTransfer, Payout, TransferError, ValueTransfer};

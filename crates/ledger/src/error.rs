use chrono::{DateTime, Utc};
use thiserror::Error;

use grouppool_core::{AccountId, Amount};

/// Why the ledger rejected a command.
///
/// Every variant is raised by `Ledger::handle` before any state changes, so
/// a rejected call never leaves a partial effect behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("depositor is not a member in the group")]
    NotMember(AccountId),

    #[error("recipient is not a member in the group")]
    UnknownRecipient(AccountId),

    #[error("insufficient balance")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("ledger has been settled and is closed")]
    Terminated,

    #[error("ledger matures after {deadline}, now is {now}")]
    NotYetMature {
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Only the creator may enrol new members.
    #[error("only the ledger creator may add members")]
    Unauthorized,

    #[error("{0} is already a member")]
    AlreadyMember(AccountId),

    #[error("ledger does not exist")]
    NotCreated,

    #[error("ledger already exists")]
    AlreadyCreated,

    #[error("duration of {0}s cannot be represented")]
    InvalidDuration(u64),

    #[error("balance overflow")]
    Overflow,
}

//! Group pool ledger (time-locked, member-scoped, event-sourced).
//!
//! Pure domain logic only: no IO, no clock, no value transfers. The service
//! layer supplies the time, the caller and the payouts.

pub mod command;
pub mod error;
pub mod event;
pub mod ledger;

#[cfg(test)]
mod properties;

pub use command::{AddMember, CreateLedger, Deposit, LedgerCommand, SettleUp, Transact, Withdraw};
pub use error::LedgerError;
pub use event::{
    Deposited, LedgerCreated, LedgerEvent, MemberAdded, Settled, Transacted, WithdrawalKind,
    Withdrawn,
};
pub use ledger::Ledger;

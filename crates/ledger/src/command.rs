use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grouppool_core::{AccountId, Amount, LedgerId};

/// Command: CreateLedger. The caller becomes the creator and first member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLedger {
    pub ledger_id: LedgerId,
    pub creator: AccountId,
    /// Seconds between creation and the settlement deadline (0 is allowed).
    pub duration_secs: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddMember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMember {
    pub caller: AccountId,
    pub account: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Deposit. `amount` is the value attached to the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub caller: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Withdraw from the caller's own balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub caller: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Transact (internal credit move, no real value leaves the pool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transact {
    pub caller: AccountId,
    pub to: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SettleUp. `occurred_at` is compared against the deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleUp {
    pub caller: AccountId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    CreateLedger(CreateLedger),
    AddMember(AddMember),
    Deposit(Deposit),
    Withdraw(Withdraw),
    Transact(Transact),
    SettleUp(SettleUp),
}

impl LedgerCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::CreateLedger(_) => "create",
            LedgerCommand::AddMember(_) => "add_member",
            LedgerCommand::Deposit(_) => "deposit",
            LedgerCommand::Withdraw(_) => "withdraw",
            LedgerCommand::Transact(_) => "transact",
            LedgerCommand::SettleUp(_) => "settle_up",
        }
    }

    /// Identity the command is attributed to.
    pub fn caller(&self) -> &AccountId {
        match self {
            LedgerCommand::CreateLedger(c) => &c.creator,
            LedgerCommand::AddMember(c) => &c.caller,
            LedgerCommand::Deposit(c) => &c.caller,
            LedgerCommand::Withdraw(c) => &c.caller,
            LedgerCommand::Transact(c) => &c.caller,
            LedgerCommand::SettleUp(c) => &c.caller,
        }
    }
}

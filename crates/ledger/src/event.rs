use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grouppool_core::{AccountId, Amount, LedgerId};
use grouppool_events::Event;

/// Event: LedgerCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCreated {
    pub ledger_id: LedgerId,
    pub creator: AccountId,
    pub deadline: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAdded {
    pub account: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// What triggered a withdrawal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalKind {
    /// The member asked for their credit.
    #[default]
    OnDemand,
    /// Paid out by settlement.
    Settlement,
}

/// Event: Withdrawal. Real value of `amount` left the pool towards `account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    pub account: AccountId,
    pub amount: Amount,
    #[serde(default)]
    pub kind: WithdrawalKind,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Transact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transacted {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Settled. Always the last event of a ledger stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settled {
    pub settled_count: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Created(LedgerCreated),
    MemberAdded(MemberAdded),
    Deposit(Deposited),
    Withdrawal(Withdrawn),
    Transact(Transacted),
    Settled(Settled),
}

impl LedgerEvent {
    /// Real value this event sends out of the pool, if any.
    pub fn payout(&self) -> Option<(&AccountId, Amount)> {
        match self {
            LedgerEvent::Withdrawal(w) => Some((&w.account, w.amount)),
            _ => None,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Created(_) => "pool.ledger.created",
            LedgerEvent::MemberAdded(_) => "pool.ledger.member_added",
            LedgerEvent::Deposit(_) => "pool.ledger.deposit",
            LedgerEvent::Withdrawal(_) => "pool.ledger.withdrawal",
            LedgerEvent::Transact(_) => "pool.ledger.transact",
            LedgerEvent::Settled(_) => "pool.ledger.settled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Created(e) => e.occurred_at,
            LedgerEvent::MemberAdded(e) => e.occurred_at,
            LedgerEvent::Deposit(e) => e.occurred_at,
            LedgerEvent::Withdrawal(e) => e.occurred_at,
            LedgerEvent::Transact(e) => e.occurred_at,
            LedgerEvent::Settled(e) => e.occurred_at,
        }
    }
}

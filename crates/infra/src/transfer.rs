//! Outbound value movement (paying real funds to an account).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use grouppool_core::{AccountId, Amount};

/// One outbound payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payout {
    pub account: AccountId,
    pub amount: Amount,
}

impl Payout {
    pub fn new(account: AccountId, amount: Amount) -> Self {
        Self { account, amount }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The receiving side refused the payment.
    #[error("payment to {account} was rejected")]
    Rejected { account: AccountId },

    /// The transfer backend could not be reached or is in a broken state.
    #[error("transfer backend unavailable: {0}")]
    Unavailable(String),
}

/// Moves real value out of the pool.
///
/// `pay_batch` must be all-or-nothing: if any payout fails, none of them
/// may have been delivered when it returns an error.
pub trait ValueTransfer: Send + Sync {
    fn pay(&self, account: &AccountId, amount: Amount) -> Result<(), TransferError>;

    fn pay_batch(&self, payouts: &[Payout]) -> Result<(), TransferError>;
}

impl<T> ValueTransfer for Arc<T>
where
    T: ValueTransfer + ?Sized,
{
    fn pay(&self, account: &AccountId, amount: Amount) -> Result<(), TransferError> {
        (**self).pay(account, amount)
    }

    fn pay_batch(&self, payouts: &[Payout]) -> Result<(), TransferError> {
        (**self).pay_batch(payouts)
    }
}

#[derive(Debug, Default)]
struct TransferState {
    received: HashMap<AccountId, u128>,
    log: Vec<Payout>,
    rejecting: HashSet<AccountId>,
}

impl TransferState {
    fn check(&self, account: &AccountId) -> Result<(), TransferError> {
        if self.rejecting.contains(account) {
            return Err(TransferError::Rejected {
                account: account.clone(),
            });
        }
        Ok(())
    }

    fn deliver(&mut self, payout: Payout) {
        *self.received.entry(payout.account.clone()).or_insert(0) += u128::from(payout.amount);
        self.log.push(payout);
    }
}

/// In-memory transfer backend: records what each account has received.
///
/// Accounts can be marked as rejecting to exercise failure paths.
#[derive(Debug, Default)]
pub struct InMemoryTransfer {
    state: Mutex<TransferState>,
}

impl InMemoryTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total value delivered to `account` so far.
    pub fn received_by(&self, account: &AccountId) -> u128 {
        self.state
            .lock()
            .map(|s| s.received.get(account).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Every delivered payout, in delivery order.
    pub fn payouts(&self) -> Vec<Payout> {
        self.state.lock().map(|s| s.log.clone()).unwrap_or_default()
    }

    /// Make every future payment to `account` fail.
    pub fn reject(&self, account: AccountId) {
        if let Ok(mut s) = self.state.lock() {
            s.rejecting.insert(account);
        }
    }

    pub fn accept(&self, account: &AccountId) {
        if let Ok(mut s) = self.state.lock() {
            s.rejecting.remove(account);
        }
    }
}

impl ValueTransfer for InMemoryTransfer {
    fn pay(&self, account: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TransferError::Unavailable("lock poisoned".to_string()))?;
        state.check(account)?;
        state.deliver(Payout::new(account.clone(), amount));
        Ok(())
    }

    fn pay_batch(&self, payouts: &[Payout]) -> Result<(), TransferError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TransferError::Unavailable("lock poisoned".to_string()))?;

        // Validate the whole batch before delivering anything.
        for p in payouts {
            state.check(&p.account)?;
        }
        for p in payouts {
            state.deliver(p.clone());
        }
        Ok(())
    }
}

//! Ledger command execution (application-level orchestration).
//!
//! `LedgerService` runs every mutating operation through the same pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Take the ledger's lock (one command per ledger at a time)
//!   ↓
//! 2. Load the stream and rehydrate the aggregate
//!   ↓
//! 3. Handle the command (pure decision logic, produces events)
//!   ↓
//! 4. Deliver payouts for any non-zero withdrawal events
//!   ↓
//! 5. Append events (optimistic concurrency check)
//!   ↓
//! 6. Publish envelopes to the bus
//! ```
//!
//! A rejection in steps 2–4 leaves the stream untouched, so nothing about
//! the ledger changes unless the payout went through.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use grouppool_core::{AccountId, Aggregate, Amount, ExpectedVersion, LedgerId};
use grouppool_events::{EventBus, EventEnvelope, Subscription, Topic};
use grouppool_ledger::{
    AddMember, CreateLedger, Deposit, Ledger, LedgerCommand, LedgerError, LedgerEvent, SettleUp,
    Transact, Withdraw,
};

use crate::clock::Clock;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::transfer::{Payout, TransferError, ValueTransfer};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The ledger rejected the command.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Paying out failed; nothing was recorded.
    #[error("value transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Optimistic concurrency failure or a poisoned ledger lock.
    #[error("conflict: {0}")]
    Concurrency(String),

    /// Failed to deserialize historical event payloads into ledger events.
    #[error("corrupt event payload: {0}")]
    Deserialize(String),

    /// The event store failed or returned an inconsistent stream.
    #[error("event store error: {0}")]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Outcome of a committed command.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub ledger_id: LedgerId,
    /// Events emitted by this call, in order.
    pub events: Vec<LedgerEvent>,
    /// Real value sent out of the pool by this call.
    pub paid: u128,
    /// Ledger state right after the call.
    pub ledger: Ledger,
}

/// Serialized command execution over many ledgers.
///
/// Commands for the same ledger are totally ordered by a per-ledger mutex
/// held across the whole pipeline, including the payout. Different ledgers
/// do not contend.
///
/// ## Generic Parameters
///
/// - `S`: event store
/// - `B`: event bus receiving committed envelopes
/// - `C`: clock supplying command time
/// - `T`: outbound value transfer
pub struct LedgerService<S, B, C, T> {
    store: S,
    bus: B,
    clock: C,
    transfer: T,
    locks: Mutex<HashMap<LedgerId, Arc<Mutex<()>>>>,
}

impl<S, B, C, T> core::fmt::Debug for LedgerService<S, B, C, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LedgerService").finish_non_exhaustive()
    }
}

impl<S, B, C, T> LedgerService<S, B, C, T> {
    pub fn new(store: S, bus: B, clock: C, transfer: T) -> Self {
        Self {
            store,
            bus,
            clock,
            transfer,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, ledger_id: LedgerId) -> Result<Arc<Mutex<()>>, DispatchError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| DispatchError::Concurrency("lock table poisoned".to_string()))?;
        Ok(locks.entry(ledger_id).or_default().clone())
    }

    /// Drop the caller's handle and forget the lock once nobody else holds it.
    ///
    /// The table only ever contains ledgers with a command in flight.
    fn release(&self, ledger_id: LedgerId, lock: Arc<Mutex<()>>) {
        drop(lock);
        if let Ok(mut locks) = self.locks.lock() {
            if locks
                .get(&ledger_id)
                .is_some_and(|held| Arc::strong_count(held) == 1)
            {
                locks.remove(&ledger_id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn lock_table_len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

impl<S, B, C, T> LedgerService<S, B, C, T>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    C: Clock,
    T: ValueTransfer,
{
    /// Create a new ledger; `creator` becomes its first member.
    pub fn create(
        &self,
        creator: AccountId,
        duration_secs: u64,
    ) -> Result<Receipt, DispatchError> {
        let ledger_id = LedgerId::new();
        self.dispatch(ledger_id, |now| {
            LedgerCommand::CreateLedger(CreateLedger {
                ledger_id,
                creator,
                duration_secs,
                occurred_at: now,
            })
        })
    }

    pub fn add_member(
        &self,
        ledger_id: LedgerId,
        caller: AccountId,
        account: AccountId,
    ) -> Result<Receipt, DispatchError> {
        self.dispatch(ledger_id, |now| {
            LedgerCommand::AddMember(AddMember {
                caller,
                account,
                occurred_at: now,
            })
        })
    }

    /// Record `amount` of value attached to the caller's request.
    pub fn deposit(
        &self,
        ledger_id: LedgerId,
        caller: AccountId,
        amount: Amount,
    ) -> Result<Receipt, DispatchError> {
        self.dispatch(ledger_id, |now| {
            LedgerCommand::Deposit(Deposit {
                caller,
                amount,
                occurred_at: now,
            })
        })
    }

    /// Pay `amount` of the caller's credit back to them. `Receipt::paid` is the amount sent.
    pub fn withdraw(
        &self,
        ledger_id: LedgerId,
        caller: AccountId,
        amount: Amount,
    ) -> Result<Receipt, DispatchError> {
        self.dispatch(ledger_id, |now| {
            LedgerCommand::Withdraw(Withdraw {
                caller,
                amount,
                occurred_at: now,
            })
        })
    }

    pub fn transact(
        &self,
        ledger_id: LedgerId,
        caller: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<Receipt, DispatchError> {
        self.dispatch(ledger_id, |now| {
            LedgerCommand::Transact(Transact {
                caller,
                to,
                amount,
                occurred_at: now,
            })
        })
    }

    /// Pay every member their balance and close the ledger.
    pub fn settle_up(
        &self,
        ledger_id: LedgerId,
        caller: AccountId,
    ) -> Result<Receipt, DispatchError> {
        self.dispatch(ledger_id, |now| {
            LedgerCommand::SettleUp(SettleUp {
                caller,
                occurred_at: now,
            })
        })
    }

    /// Current state of a ledger, rebuilt from its stream.
    pub fn snapshot(&self, ledger_id: LedgerId) -> Result<Ledger, DispatchError> {
        let (ledger, _) = self.load(ledger_id)?;
        if !ledger.is_created() {
            return Err(LedgerError::NotCreated.into());
        }
        Ok(ledger)
    }

    /// The full, ordered event log of a ledger.
    pub fn events(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, DispatchError> {
        let history = self.store.load_stream(ledger_id)?;
        if history.is_empty() {
            return Err(LedgerError::NotCreated.into());
        }
        validate_loaded_stream(ledger_id, &history)?;
        Ok(history)
    }

    pub fn ledger_ids(&self) -> Result<Vec<LedgerId>, DispatchError> {
        Ok(self.store.ledger_ids()?)
    }

    /// Receive every envelope committed after this call, across all ledgers.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe(Topic::AllLedgers)
    }

    /// Receive the envelopes one ledger commits after this call.
    pub fn subscribe_ledger(&self, ledger_id: LedgerId) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe(Topic::Ledger(ledger_id))
    }

    /// Run one command through the pipeline while holding the ledger's lock.
    ///
    /// `make_command` receives the clock reading taken under the lock, so
    /// command time is monotonic per ledger.
    pub fn dispatch(
        &self,
        ledger_id: LedgerId,
        make_command: impl FnOnce(DateTime<Utc>) -> LedgerCommand,
    ) -> Result<Receipt, DispatchError> {
        let lock = self.lock_for(ledger_id)?;
        let result = match lock.lock() {
            Ok(_guard) => self.dispatch_locked(ledger_id, make_command),
            Err(_) => Err(DispatchError::Concurrency(format!(
                "ledger {ledger_id} lock poisoned"
            ))),
        };
        self.release(ledger_id, lock);
        result
    }

    fn dispatch_locked(
        &self,
        ledger_id: LedgerId,
        make_command: impl FnOnce(DateTime<Utc>) -> LedgerCommand,
    ) -> Result<Receipt, DispatchError> {
        let command = make_command(self.clock.now());

        // 1) Load + rehydrate
        let (mut ledger, expected) = self.load(ledger_id)?;

        // 2) Decide (no mutation)
        let decided = ledger.handle(&command).map_err(|e| {
            tracing::warn!(
                ledger_id = %ledger_id,
                command = command.name(),
                caller = %command.caller(),
                error = %e,
                "command rejected"
            );
            DispatchError::from(e)
        })?;

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(ledger_id, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        // 3) Pay out before anything is recorded. Zero amounts move nothing.
        let payouts: Vec<Payout> = decided
            .iter()
            .filter_map(|ev| ev.payout())
            .filter(|(_, amount)| *amount > 0)
            .map(|(account, amount)| Payout::new(account.clone(), amount))
            .collect();
        let paid: u128 = payouts.iter().map(|p| u128::from(p.amount)).sum();

        let delivery = match payouts.as_slice() {
            [] => Ok(()),
            [single] => self.transfer.pay(&single.account, single.amount),
            many => self.transfer.pay_batch(many),
        };
        if let Err(e) = delivery {
            tracing::warn!(
                ledger_id = %ledger_id,
                command = command.name(),
                error = %e,
                "payout failed; command aborted"
            );
            return Err(e.into());
        }

        // 4) Persist
        let committed = match self.store.append(uncommitted, expected) {
            Ok(c) => c,
            Err(e) => {
                if paid > 0 {
                    tracing::error!(
                        ledger_id = %ledger_id,
                        command = command.name(),
                        paid,
                        error = %e,
                        "payout delivered but append failed"
                    );
                }
                return Err(e.into());
            }
        };

        for ev in &decided {
            ledger.apply(ev);
        }

        // 5) Publish (the stream is already the source of truth)
        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                tracing::warn!(
                    ledger_id = %ledger_id,
                    sequence_number = stored.sequence_number,
                    "event publication failed: {e:?}"
                );
            }
        }

        tracing::info!(
            ledger_id = %ledger_id,
            command = command.name(),
            caller = %command.caller(),
            events = decided.len(),
            paid,
            version = ledger_version(&committed),
            "command committed"
        );

        Ok(Receipt {
            ledger_id,
            events: decided,
            paid,
            ledger,
        })
    }

    fn load(&self, ledger_id: LedgerId) -> Result<(Ledger, ExpectedVersion), DispatchError> {
        let history = self.store.load_stream(ledger_id)?;
        validate_loaded_stream(ledger_id, &history)?;
        let expected = ExpectedVersion::Exact(ledger_version(&history));

        let mut ledger = Ledger::empty(ledger_id);
        apply_history(&mut ledger, &history)?;
        Ok((ledger, expected))
    }
}

fn ledger_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    ledger_id: LedgerId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Sequence numbers must run 1, 2, 3, ... with no gaps.
    for (idx, e) in stream.iter().enumerate() {
        if e.ledger_id != ledger_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong ledger_id at index {idx}"
            ))));
        }
        let expected = idx as u64 + 1;
        if e.sequence_number != expected {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "unexpected sequence_number at index {idx} (expected {expected}, found {})",
                e.sequence_number
            ))));
        }
    }
    Ok(())
}

fn apply_history(ledger: &mut Ledger, history: &[StoredEvent]) -> Result<(), DispatchError> {
    for stored in history {
        let ev: LedgerEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        ledger.apply(&ev);
    }
    Ok(())
}

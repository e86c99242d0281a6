use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use grouppool_core::{AccountId, Aggregate, AggregateRoot, Amount, LedgerId};

use crate::command::{AddMember, CreateLedger, Deposit, LedgerCommand, SettleUp, Transact, Withdraw};
use crate::error::LedgerError;
use crate::event::{
    Deposited, LedgerCreated, LedgerEvent, MemberAdded, Settled, Transacted, WithdrawalKind,
    Withdrawn,
};

/// Aggregate root: a time-locked group pool.
///
/// Members deposit into a shared pool, move credit between each other,
/// withdraw their own credit, and once the deadline has passed anyone can
/// settle the pool: every balance is paid back and the ledger is closed.
///
/// `balances` doubles as the membership set; `member_list` keeps insertion
/// order, which is also the settlement payout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    id: LedgerId,
    creator: Option<AccountId>,
    member_list: Vec<AccountId>,
    balances: HashMap<AccountId, Amount>,
    created_at: Option<DateTime<Utc>>,
    deadline: Option<DateTime<Utc>>,
    terminated: bool,
    settled_count: usize,
    total_deposited: u128,
    total_withdrawn: u128,
    version: u64,
    created: bool,
}

impl Ledger {
    /// Empty aggregate for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            creator: None,
            member_list: Vec::new(),
            balances: HashMap::new(),
            created_at: None,
            deadline: None,
            terminated: false,
            settled_count: 0,
            total_deposited: 0,
            total_withdrawn: 0,
            version: 0,
            created: false,
        }
    }

    /// Create a ledger in one step: `deadline = now + duration_secs`.
    ///
    /// Returns the live aggregate together with the `Created` event to persist.
    pub fn create(
        id: LedgerId,
        creator: AccountId,
        duration_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<LedgerEvent>), LedgerError> {
        let mut ledger = Self::empty(id);
        let events = ledger.handle(&LedgerCommand::CreateLedger(CreateLedger {
            ledger_id: id,
            creator,
            duration_secs,
            occurred_at: now,
        }))?;
        for e in &events {
            ledger.apply(e);
        }
        Ok((ledger, events))
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn creator(&self) -> Option<&AccountId> {
        self.creator.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn num_members(&self) -> usize {
        self.member_list.len()
    }

    pub fn member_at(&self, index: usize) -> Option<&AccountId> {
        self.member_list.get(index)
    }

    /// Members in insertion order.
    pub fn members(&self) -> impl Iterator<Item = &AccountId> + '_ {
        self.member_list.iter()
    }

    pub fn is_member(&self, account: &AccountId) -> bool {
        self.balances.contains_key(account)
    }

    /// Internal balance; non-members hold nothing.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Sum of every member balance.
    pub fn total_balance(&self) -> u128 {
        self.balances.values().map(|b| u128::from(*b)).sum()
    }

    pub fn total_deposited(&self) -> u128 {
        self.total_deposited
    }

    pub fn total_withdrawn(&self) -> u128 {
        self.total_withdrawn
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn settled_count(&self) -> usize {
        self.settled_count
    }

    /// Whether `settle_up` would pass the deadline check at `now`.
    pub fn is_mature(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::Created(e) => {
                self.id = e.ledger_id;
                self.creator = Some(e.creator.clone());
                self.member_list = vec![e.creator.clone()];
                self.balances = HashMap::from([(e.creator.clone(), 0)]);
                self.created_at = Some(e.occurred_at);
                self.deadline = Some(e.deadline);
                self.created = true;
            }
            LedgerEvent::MemberAdded(e) => {
                if !self.balances.contains_key(&e.account) {
                    self.member_list.push(e.account.clone());
                    self.balances.insert(e.account.clone(), 0);
                }
            }
            LedgerEvent::Deposit(e) => {
                if let Some(balance) = self.balances.get_mut(&e.account) {
                    *balance = balance.saturating_add(e.amount);
                }
                self.total_deposited += u128::from(e.amount);
            }
            LedgerEvent::Withdrawal(e) => {
                if let Some(balance) = self.balances.get_mut(&e.account) {
                    *balance = balance.saturating_sub(e.amount);
                }
                self.total_withdrawn += u128::from(e.amount);
                if e.kind == WithdrawalKind::Settlement {
                    self.settled_count += 1;
                }
            }
            LedgerEvent::Transact(e) => {
                if e.sender != e.receiver {
                    if let Some(balance) = self.balances.get_mut(&e.sender) {
                        *balance = balance.saturating_sub(e.amount);
                    }
                    if let Some(balance) = self.balances.get_mut(&e.receiver) {
                        *balance = balance.saturating_add(e.amount);
                    }
                }
            }
            LedgerEvent::Settled(_) => {
                self.terminated = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::CreateLedger(cmd) => self.handle_create(cmd),
            LedgerCommand::AddMember(cmd) => self.handle_add_member(cmd),
            LedgerCommand::Deposit(cmd) => self.handle_deposit(cmd),
            LedgerCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
            LedgerCommand::Transact(cmd) => self.handle_transact(cmd),
            LedgerCommand::SettleUp(cmd) => self.handle_settle_up(cmd),
        }
    }
}

impl Ledger {
    /// Created and not yet settled.
    fn ensure_live(&self) -> Result<(), LedgerError> {
        if !self.created {
            return Err(LedgerError::NotCreated);
        }
        if self.terminated {
            return Err(LedgerError::Terminated);
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateLedger) -> Result<Vec<LedgerEvent>, LedgerError> {
        if self.created {
            return Err(LedgerError::AlreadyCreated);
        }

        let deadline = i64::try_from(cmd.duration_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|d| cmd.occurred_at.checked_add_signed(d))
            .ok_or(LedgerError::InvalidDuration(cmd.duration_secs))?;

        Ok(vec![LedgerEvent::Created(LedgerCreated {
            ledger_id: cmd.ledger_id,
            creator: cmd.creator.clone(),
            deadline,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_member(&self, cmd: &AddMember) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_live()?;

        if self.creator.as_ref() != Some(&cmd.caller) {
            return Err(LedgerError::Unauthorized);
        }
        if self.is_member(&cmd.account) {
            return Err(LedgerError::AlreadyMember(cmd.account.clone()));
        }

        Ok(vec![LedgerEvent::MemberAdded(MemberAdded {
            account: cmd.account.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deposit(&self, cmd: &Deposit) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_live()?;

        let Some(balance) = self.balances.get(&cmd.caller) else {
            return Err(LedgerError::NotMember(cmd.caller.clone()));
        };
        balance.checked_add(cmd.amount).ok_or(LedgerError::Overflow)?;

        Ok(vec![LedgerEvent::Deposit(Deposited {
            account: cmd.caller.clone(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &Withdraw) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_live()?;

        let available = self.balance_of(&cmd.caller);
        if available < cmd.amount {
            return Err(LedgerError::InsufficientBalance {
                requested: cmd.amount,
                available,
            });
        }

        Ok(vec![LedgerEvent::Withdrawal(Withdrawn {
            account: cmd.caller.clone(),
            amount: cmd.amount,
            kind: WithdrawalKind::OnDemand,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transact(&self, cmd: &Transact) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_live()?;

        if !self.is_member(&cmd.to) {
            return Err(LedgerError::UnknownRecipient(cmd.to.clone()));
        }

        let available = self.balance_of(&cmd.caller);
        if available < cmd.amount {
            return Err(LedgerError::InsufficientBalance {
                requested: cmd.amount,
                available,
            });
        }
        if cmd.caller != cmd.to {
            self.balance_of(&cmd.to)
                .checked_add(cmd.amount)
                .ok_or(LedgerError::Overflow)?;
        }

        Ok(vec![LedgerEvent::Transact(Transacted {
            sender: cmd.caller.clone(),
            receiver: cmd.to.clone(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_settle_up(&self, cmd: &SettleUp) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_live()?;

        let deadline = self.deadline.ok_or(LedgerError::NotCreated)?;
        if cmd.occurred_at <= deadline {
            return Err(LedgerError::NotYetMature {
                deadline,
                now: cmd.occurred_at,
            });
        }

        // One payout per member in insertion order, then the terminal marker.
        let mut events: Vec<LedgerEvent> = self
            .member_list
            .iter()
            .map(|account| {
                LedgerEvent::Withdrawal(Withdrawn {
                    account: account.clone(),
                    amount: self.balance_of(account),
                    kind: WithdrawalKind::Settlement,
                    occurred_at: cmd.occurred_at,
                })
            })
            .collect();

        events.push(LedgerEvent::Settled(Settled {
            settled_count: self.member_list.len(),
            occurred_at: cmd.occurred_at,
        }));

        Ok(events)
    }
}

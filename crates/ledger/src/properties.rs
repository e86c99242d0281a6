//! Property tests over random command sequences.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;

use grouppool_core::{AccountId, Aggregate, Amount, LedgerId};

use crate::{
    AddMember, Deposit, Ledger, LedgerCommand, LedgerError, LedgerEvent, SettleUp, Transact,
    Withdraw,
};

const DURATION: u64 = 100;
const ACCOUNTS: [&str; 5] = ["acct-0", "acct-1", "acct-2", "acct-3", "acct-4"];

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Deposit(usize, Amount),
    Withdraw(usize, Amount),
    Transact(usize, usize, Amount),
}

fn account(idx: usize) -> AccountId {
    AccountId::new(ACCOUNTS[idx]).unwrap()
}

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_225_600, 0).unwrap()
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let idx = 0..ACCOUNTS.len();
    prop_oneof![
        idx.clone().prop_map(Op::Add),
        (idx.clone(), 0u64..10_000).prop_map(|(i, a)| Op::Deposit(i, a)),
        (idx.clone(), 0u64..10_000).prop_map(|(i, a)| Op::Withdraw(i, a)),
        (idx.clone(), idx, 0u64..10_000).prop_map(|(f, t, a)| Op::Transact(f, t, a)),
    ]
}

fn to_command(op: &Op) -> LedgerCommand {
    let occurred_at = t0();
    match op {
        Op::Add(i) => LedgerCommand::AddMember(AddMember {
            caller: account(0),
            account: account(*i),
            occurred_at,
        }),
        Op::Deposit(i, amount) => LedgerCommand::Deposit(Deposit {
            caller: account(*i),
            amount: *amount,
            occurred_at,
        }),
        Op::Withdraw(i, amount) => LedgerCommand::Withdraw(Withdraw {
            caller: account(*i),
            amount: *amount,
            occurred_at,
        }),
        Op::Transact(f, t, amount) => LedgerCommand::Transact(Transact {
            caller: account(*f),
            to: account(*t),
            amount: *amount,
            occurred_at,
        }),
    }
}

fn step(ledger: &mut Ledger, cmd: &LedgerCommand) -> Result<Vec<LedgerEvent>, LedgerError> {
    let events = ledger.handle(cmd)?;
    for e in &events {
        ledger.apply(e);
    }
    Ok(events)
}

fn new_ledger() -> Ledger {
    Ledger::create(LedgerId::new(), account(0), DURATION, t0())
        .unwrap()
        .0
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: the pool always holds exactly what went in minus what went out,
    /// and no rejected command changes anything.
    #[test]
    fn balances_are_conserved(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut ledger = new_ledger();
        let mut deposited: u128 = 0;
        let mut withdrawn: u128 = 0;

        for op in &ops {
            let before = ledger.clone();
            match step(&mut ledger, &to_command(op)) {
                Ok(events) => {
                    for e in &events {
                        match e {
                            LedgerEvent::Deposit(d) => deposited += u128::from(d.amount),
                            LedgerEvent::Withdrawal(w) => withdrawn += u128::from(w.amount),
                            _ => {}
                        }
                    }
                }
                Err(_) => prop_assert_eq!(&ledger, &before),
            }
            prop_assert_eq!(ledger.total_balance(), deposited - withdrawn);
            prop_assert_eq!(ledger.total_deposited(), deposited);
            prop_assert_eq!(ledger.total_withdrawn(), withdrawn);
        }
    }

    /// Property: overdrafts are rejected, never clamped.
    #[test]
    fn overdrafts_are_rejected(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut ledger = new_ledger();
        let mut model: HashMap<AccountId, Amount> = HashMap::from([(account(0), 0)]);

        for op in &ops {
            let result = step(&mut ledger, &to_command(op));
            match op {
                Op::Withdraw(i, amount) | Op::Transact(i, _, amount) => {
                    let held = model.get(&account(*i)).copied().unwrap_or(0);
                    let recipient_ok = match op {
                        Op::Transact(_, t, _) => model.contains_key(&account(*t)),
                        _ => true,
                    };
                    if *amount > held && recipient_ok {
                        let is_insufficient =
                            matches!(result, Err(LedgerError::InsufficientBalance { .. }));
                        prop_assert!(is_insufficient);
                    }
                }
                _ => {}
            }
            // A non-member holds 0, so a zero-amount withdraw or transact from
            // one succeeds without touching the model.
            if result.is_ok() {
                match op {
                    Op::Add(i) => { model.insert(account(*i), 0); }
                    Op::Deposit(i, a) => {
                        if let Some(b) = model.get_mut(&account(*i)) { *b += a; }
                    }
                    Op::Withdraw(i, a) => {
                        if let Some(b) = model.get_mut(&account(*i)) { *b -= a; }
                    }
                    Op::Transact(f, t, a) => {
                        if let Some(b) = model.get_mut(&account(*f)) { *b -= a; }
                        if let Some(b) = model.get_mut(&account(*t)) { *b += a; }
                    }
                }
            }
            prop_assert_eq!(ledger.num_members(), model.len());
            for (acct, balance) in &model {
                prop_assert_eq!(ledger.balance_of(acct), *balance);
            }
        }
    }

    /// Property: the member list only ever grows, and keeps its prefix.
    #[test]
    fn membership_is_monotonic(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut ledger = new_ledger();
        let mut seen: Vec<AccountId> = ledger.members().cloned().collect();

        for op in &ops {
            let _ = step(&mut ledger, &to_command(op));
            let now: Vec<AccountId> = ledger.members().cloned().collect();
            prop_assert!(now.len() >= seen.len());
            prop_assert_eq!(&now[..seen.len()], &seen[..]);
            prop_assert_eq!(ledger.member_at(0), Some(&account(0)));
            seen = now;
        }
    }

    /// Property: settlement pays every member exactly their balance, in order,
    /// and afterwards every command fails with `Terminated` without effect.
    #[test]
    fn settlement_is_total_and_final(
        ops in prop::collection::vec(op_strategy(), 0..40),
        after_ops in prop::collection::vec(op_strategy(), 1..10),
    ) {
        let mut ledger = new_ledger();
        for op in &ops {
            let _ = step(&mut ledger, &to_command(op));
        }

        let expected: Vec<(AccountId, Amount)> = ledger
            .members()
            .map(|a| (a.clone(), ledger.balance_of(a)))
            .collect();

        let settle = LedgerCommand::SettleUp(SettleUp {
            caller: account(3),
            occurred_at: t0() + TimeDelta::seconds(DURATION as i64 + 1),
        });
        let events = step(&mut ledger, &settle).unwrap();

        let paid: Vec<(AccountId, Amount)> = events
            .iter()
            .filter_map(|e| e.payout().map(|(a, amt)| (a.clone(), amt)))
            .collect();
        prop_assert_eq!(paid, expected);
        prop_assert!(ledger.is_terminated());
        prop_assert_eq!(ledger.settled_count(), ledger.num_members());
        prop_assert_eq!(ledger.total_balance(), 0);

        let frozen = ledger.clone();
        for op in &after_ops {
            prop_assert_eq!(step(&mut ledger, &to_command(op)), Err(LedgerError::Terminated));
        }
        prop_assert_eq!(step(&mut ledger, &settle), Err(LedgerError::Terminated));
        prop_assert_eq!(&ledger, &frozen);
    }
}

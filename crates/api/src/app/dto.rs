use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use grouppool_core::{AccountId, AggregateRoot, LedgerId};
use grouppool_events::Event;
use grouppool_infra::Receipt;
use grouppool_infra::event_store::StoredEvent;
use grouppool_ledger::{Ledger, LedgerEvent, WithdrawalKind};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateLedgerRequest {
    /// Lock period in seconds; the server default applies when absent.
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub account: String,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct TransactRequest {
    pub to: String,
    pub amount: u64,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_ledger_id(raw: &str) -> Result<LedgerId, axum::response::Response> {
    raw.parse::<LedgerId>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_ledger_id",
            format!("'{raw}' is not a ledger id"),
        )
    })
}

pub fn parse_account(raw: &str) -> Result<AccountId, axum::response::Response> {
    AccountId::new(raw).map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_account", e.to_string())
    })
}

// -------------------------
// Response mapping
// -------------------------

/// Totals are `u128`; anything that does not fit a JSON integer is sent as a string.
fn wide_amount(value: u128) -> JsonValue {
    u64::try_from(value)
        .map(JsonValue::from)
        .unwrap_or_else(|_| JsonValue::String(value.to_string()))
}

fn withdrawal_kind(kind: WithdrawalKind) -> &'static str {
    match kind {
        WithdrawalKind::OnDemand => "on_demand",
        WithdrawalKind::Settlement => "settlement",
    }
}

pub fn event_to_json(event: &LedgerEvent) -> JsonValue {
    let mut body = match event {
        LedgerEvent::Created(e) => json!({
            "ledger_id": e.ledger_id.to_string(),
            "creator": e.creator.as_str(),
            "deadline": e.deadline,
        }),
        LedgerEvent::MemberAdded(e) => json!({ "account": e.account.as_str() }),
        LedgerEvent::Deposit(e) => json!({
            "account": e.account.as_str(),
            "amount": e.amount,
        }),
        LedgerEvent::Withdrawal(e) => json!({
            "account": e.account.as_str(),
            "amount": e.amount,
            "kind": withdrawal_kind(e.kind),
        }),
        LedgerEvent::Transact(e) => json!({
            "sender": e.sender.as_str(),
            "receiver": e.receiver.as_str(),
            "amount": e.amount,
        }),
        LedgerEvent::Settled(e) => json!({ "settled_count": e.settled_count }),
    };
    body["type"] = json!(event.event_type());
    body["occurred_at"] = json!(event.occurred_at());
    body
}

pub fn stored_event_to_json(event: &StoredEvent) -> JsonValue {
    json!({
        "sequence_number": event.sequence_number,
        "event_id": event.event_id.to_string(),
        "type": event.event_type,
        "version": event.event_version,
        "occurred_at": event.occurred_at,
        "payload": event.payload,
    })
}

pub fn receipt_to_json(receipt: &Receipt) -> JsonValue {
    json!({
        "ledger_id": receipt.ledger_id.to_string(),
        "version": receipt.ledger.version(),
        "paid": wide_amount(receipt.paid),
        "events": receipt.events.iter().map(event_to_json).collect::<Vec<_>>(),
    })
}

pub fn ledger_to_json(ledger: &Ledger) -> JsonValue {
    let members = ledger
        .members()
        .map(|account| {
            json!({
                "account": account.as_str(),
                "balance": ledger.balance_of(account),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "id": ledger.id_typed().to_string(),
        "version": ledger.version(),
        "creator": ledger.creator().map(AccountId::as_str),
        "created_at": ledger.created_at(),
        "deadline": ledger.deadline(),
        "terminated": ledger.is_terminated(),
        "settled_count": ledger.settled_count(),
        "num_members": ledger.num_members(),
        "members": members,
        "total_balance": wide_amount(ledger.total_balance()),
        "total_deposited": wide_amount(ledger.total_deposited()),
        "total_withdrawn": wide_amount(ledger.total_withdrawn()),
    })
}

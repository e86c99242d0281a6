use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/ledgers", get(list_ledgers).post(create_ledger))
        .route("/ledgers/:id", get(get_ledger))
        .route("/ledgers/:id/members", post(add_member))
        .route("/ledgers/:id/members/:index", get(member_at))
        .route("/ledgers/:id/balances/:account", get(balance_of))
        .route("/ledgers/:id/deposit", post(deposit))
        .route("/ledgers/:id/withdraw", post(withdraw))
        .route("/ledgers/:id/transact", post(transact))
        .route("/ledgers/:id/settle", post(settle_up))
        .route("/ledgers/:id/events", get(list_events))
}

fn committed(status: StatusCode, receipt: &grouppool_infra::Receipt) -> axum::response::Response {
    (status, Json(dto::receipt_to_json(receipt))).into_response()
}

pub async fn list_ledgers(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.ledgers.ledger_ids() {
        Ok(ids) => {
            let items = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn create_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<dto::CreateLedgerRequest>,
) -> axum::response::Response {
    let duration_secs = body.duration_secs.unwrap_or(services.default_duration_secs);

    match services.ledgers.create(caller.into_account(), duration_secs) {
        Ok(receipt) => committed(StatusCode::CREATED, &receipt),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledgers.snapshot(ledger_id) {
        Ok(ledger) => (StatusCode::OK, Json(dto::ledger_to_json(&ledger))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddMemberRequest>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let account = match dto::parse_account(&body.account) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledgers.add_member(ledger_id, caller.into_account(), account) {
        Ok(receipt) => committed(StatusCode::OK, &receipt),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn member_at(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, index)): Path<(String, usize)>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let ledger = match services.ledgers.snapshot(ledger_id) {
        Ok(l) => l,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    match ledger.member_at(index) {
        Some(account) => (
            StatusCode::OK,
            Json(serde_json::json!({ "index": index, "account": account.as_str() })),
        )
            .into_response(),
        None => errors::json_error(
            StatusCode::NOT_FOUND,
            "member_not_found",
            format!("no member at index {index} (ledger has {})", ledger.num_members()),
        ),
    }
}

pub async fn balance_of(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, account)): Path<(String, String)>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let account = match dto::parse_account(&account) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledgers.snapshot(ledger_id) {
        Ok(ledger) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "account": account.as_str(),
                "is_member": ledger.is_member(&account),
                "balance": ledger.balance_of(&account),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledgers.deposit(ledger_id, caller.into_account(), body.amount) {
        Ok(receipt) => committed(StatusCode::OK, &receipt),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmountRequest>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledgers.withdraw(ledger_id, caller.into_account(), body.amount) {
        Ok(receipt) => committed(StatusCode::OK, &receipt),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn transact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransactRequest>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let to = match dto::parse_account(&body.to) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .ledgers
        .transact(ledger_id, caller.into_account(), to, body.amount)
    {
        Ok(receipt) => committed(StatusCode::OK, &receipt),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn settle_up(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledgers.settle_up(ledger_id, caller.into_account()) {
        Ok(receipt) => committed(StatusCode::OK, &receipt),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let ledger_id = match dto::parse_ledger_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledgers.events(ledger_id) {
        Ok(events) => {
            let items = events.iter().map(dto::stored_event_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

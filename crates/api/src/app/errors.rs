use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use grouppool_infra::DispatchError;
use grouppool_ledger::LedgerError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Ledger(e) => ledger_error_to_response(e),
        DispatchError::Transfer(e) => {
            json_error(StatusCode::BAD_GATEWAY, "transfer_failed", e.to_string())
        }
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
    }
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let (status, code) = match &err {
        LedgerError::NotMember(_) => (StatusCode::FORBIDDEN, "not_member"),
        LedgerError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized"),
        LedgerError::UnknownRecipient(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_recipient"),
        LedgerError::InsufficientBalance { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_balance")
        }
        LedgerError::Overflow => (StatusCode::UNPROCESSABLE_ENTITY, "overflow"),
        LedgerError::Terminated => (StatusCode::CONFLICT, "terminated"),
        LedgerError::NotYetMature { .. } => (StatusCode::CONFLICT, "not_yet_mature"),
        LedgerError::AlreadyMember(_) => (StatusCode::CONFLICT, "already_member"),
        LedgerError::AlreadyCreated => (StatusCode::CONFLICT, "already_created"),
        LedgerError::NotCreated => (StatusCode::NOT_FOUND, "not_found"),
        LedgerError::InvalidDuration(_) => (StatusCode::BAD_REQUEST, "invalid_duration"),
    };
    json_error(status, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

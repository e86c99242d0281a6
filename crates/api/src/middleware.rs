use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use grouppool_core::AccountId;

use crate::app::errors::json_error;
use crate::context::CallerContext;

/// Header carrying the caller's account identifier.
pub const CALLER_HEADER: &str = "x-account-id";

pub async fn caller_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let account = extract_caller(req.headers())?;
    req.extensions_mut().insert(CallerContext::new(account));
    Ok(next.run(req).await)
}

fn extract_caller(headers: &HeaderMap) -> Result<AccountId, Response> {
    let unauthorized =
        |msg: &str| json_error(StatusCode::UNAUTHORIZED, "unauthenticated", msg.to_string());

    let header = headers
        .get(CALLER_HEADER)
        .ok_or_else(|| unauthorized("missing X-Account-Id header"))?;
    let raw = header
        .to_str()
        .map_err(|_| unauthorized("X-Account-Id must be visible ASCII"))?;

    AccountId::new(raw).map_err(|_| unauthorized("X-Account-Id must not be empty"))
}

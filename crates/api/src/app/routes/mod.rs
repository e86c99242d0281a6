use axum::Router;

pub mod ledgers;
pub mod system;

/// Router for every endpoint that needs a caller.
pub fn router() -> Router {
    Router::new().merge(ledgers::router())
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use grouppool_api::config::ApiConfig;
use grouppool_core::AccountId;
use grouppool_infra::{InMemoryTransfer, ManualClock};
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    clock: Arc<ManualClock>,
    transfer: Arc<InMemoryTransfer>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, but with a hand-driven clock and an ephemeral port.
        let start = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let config = ApiConfig {
            default_duration_secs: 100,
            ..ApiConfig::default()
        };
        let transfer = Arc::new(InMemoryTransfer::new());
        let app = grouppool_api::app::build_app_with(&config, clock.clone(), transfer.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            clock,
            transfer,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, caller: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("X-Account-Id", caller)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, caller: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Account-Id", caller)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn create_ledger(&self, creator: &str) -> String {
        let (status, body) = self.post(creator, "/ledgers", json!({})).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["ledger_id"].as_str().unwrap().to_string()
    }

    fn received_by(&self, account: &str) -> u128 {
        self.transfer.received_by(&AccountId::new(account).unwrap())
    }

    async fn balance(&self, ledger: &str, account: &str) -> Value {
        let (status, body) = self
            .get(account, &format!("/ledgers/{ledger}/balances/{account}"))
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_needs_no_caller() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn caller_header_is_required() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .post(format!("{}/ledgers", srv.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn create_makes_the_caller_first_member() {
    let srv = TestServer::spawn().await;
    let id = srv.create_ledger("alice").await;

    let (status, summary) = srv.get("bob", &format!("/ledgers/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["creator"], "alice");
    assert_eq!(summary["num_members"], 1);
    assert_eq!(summary["terminated"], false);
    assert_eq!(summary["deadline"], json!("2026-01-01T00:01:40Z"));

    let (status, member) = srv.get("bob", &format!("/ledgers/{id}/members/0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(member["account"], "alice");

    let (status, _) = srv.get("bob", &format!("/ledgers/{id}/members/1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = srv.get("bob", "/ledgers").await;
    assert!(listed["items"].as_array().unwrap().iter().any(|v| v == &json!(id)));
}

#[tokio::test]
async fn deposit_and_withdraw_round_trip() {
    let srv = TestServer::spawn().await;
    let id = srv.create_ledger("alice").await;

    let (status, receipt) = srv
        .post("alice", &format!("/ledgers/{id}/deposit"), json!({ "amount": 100 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["events"][0]["type"], "pool.ledger.deposit");
    assert_eq!(receipt["events"][0]["amount"], 100);

    let (status, receipt) = srv
        .post("alice", &format!("/ledgers/{id}/withdraw"), json!({ "amount": 50 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["paid"], 50);
    assert_eq!(receipt["events"][0]["type"], "pool.ledger.withdrawal");
    assert_eq!(srv.received_by("alice"), 50);

    let balance = srv.balance(&id, "alice").await;
    assert_eq!(balance["balance"], 50);
    assert_eq!(balance["is_member"], true);
}

#[tokio::test]
async fn rejected_operations_map_to_error_bodies() {
    let srv = TestServer::spawn().await;
    let id = srv.create_ledger("alice").await;

    let (status, body) = srv
        .post("mallory", &format!("/ledgers/{id}/deposit"), json!({ "amount": 1 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_member");
    assert_eq!(body["message"], "depositor is not a member in the group");

    let (status, body) = srv
        .post("alice", &format!("/ledgers/{id}/withdraw"), json!({ "amount": 50 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "insufficient balance");

    let (status, body) = srv
        .post("mallory", &format!("/ledgers/{id}/members"), json!({ "account": "eve" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = srv
        .post("alice", &format!("/ledgers/{id}/members"), json!({ "account": "alice" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_member");

    let non_member = srv.balance(&id, "mallory").await;
    assert_eq!(non_member["is_member"], false);
    assert_eq!(non_member["balance"], 0);
}

#[tokio::test]
async fn transact_moves_credit_between_members() {
    let srv = TestServer::spawn().await;
    let id = srv.create_ledger("alice").await;

    let (status, _) = srv
        .post("alice", &format!("/ledgers/{id}/members"), json!({ "account": "bob" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    srv.post("alice", &format!("/ledgers/{id}/deposit"), json!({ "amount": 100 }))
        .await;

    let (status, receipt) = srv
        .post(
            "alice",
            &format!("/ledgers/{id}/transact"),
            json!({ "to": "bob", "amount": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["paid"], 0);
    assert_eq!(receipt["events"][0]["type"], "pool.ledger.transact");
    assert_eq!(receipt["events"][0]["sender"], "alice");
    assert_eq!(receipt["events"][0]["receiver"], "bob");

    assert_eq!(srv.balance(&id, "alice").await["balance"], 50);
    assert_eq!(srv.balance(&id, "bob").await["balance"], 50);

    let (status, body) = srv
        .post(
            "alice",
            &format!("/ledgers/{id}/transact"),
            json!({ "to": "stranger", "amount": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unknown_recipient");
}

#[tokio::test]
async fn settlement_pays_everyone_and_closes_the_ledger() {
    let srv = TestServer::spawn().await;
    let id = srv.create_ledger("alice").await;
    srv.post("alice", &format!("/ledgers/{id}/members"), json!({ "account": "bob" }))
        .await;
    srv.post("alice", &format!("/ledgers/{id}/deposit"), json!({ "amount": 50 }))
        .await;
    srv.post("bob", &format!("/ledgers/{id}/deposit"), json!({ "amount": 100 }))
        .await;

    let (status, body) = srv.post("carol", &format!("/ledgers/{id}/settle"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_yet_mature");

    srv.clock.advance_secs(101);
    let (status, receipt) = srv.post("carol", &format!("/ledgers/{id}/settle"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["paid"], 150);
    assert_eq!(srv.received_by("alice"), 50);
    assert_eq!(srv.received_by("bob"), 100);
    let events = receipt["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["account"], "alice");
    assert_eq!(events[0]["amount"], 50);
    assert_eq!(events[1]["account"], "bob");
    assert_eq!(events[1]["amount"], 100);
    assert_eq!(events[2]["type"], "pool.ledger.settled");
    assert_eq!(events[2]["settled_count"], 2);

    let (_, summary) = srv.get("alice", &format!("/ledgers/{id}")).await;
    assert_eq!(summary["terminated"], true);
    assert_eq!(summary["settled_count"], 2);
    assert_eq!(summary["total_balance"], 0);

    let (status, body) = srv
        .post("alice", &format!("/ledgers/{id}/deposit"), json!({ "amount": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "terminated");
}

#[tokio::test]
async fn event_log_is_ordered() {
    let srv = TestServer::spawn().await;
    let id = srv.create_ledger("alice").await;
    srv.post("alice", &format!("/ledgers/{id}/deposit"), json!({ "amount": 3 }))
        .await;
    srv.post("alice", &format!("/ledgers/{id}/withdraw"), json!({ "amount": 2 }))
        .await;

    let (status, body) = srv.get("anyone", &format!("/ledgers/{id}/events")).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    let types: Vec<&str> = items.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["pool.ledger.created", "pool.ledger.deposit", "pool.ledger.withdrawal"]
    );
    let seqs: Vec<u64> = items
        .iter()
        .map(|e| e["sequence_number"].as_u64().unwrap())
        .collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[tokio::test]
async fn unknown_and_malformed_ledger_ids() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("alice", "/ledgers/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_ledger_id");

    let missing = "0190f5d2-0000-7000-8000-000000000000";
    let (status, body) = srv.get("alice", &format!("/ledgers/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = srv
        .post("alice", &format!("/ledgers/{missing}/deposit"), json!({ "amount": 1 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

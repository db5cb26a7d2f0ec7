//! Customer, balance and consumption integration tests.

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use common::{api_key_header_name, api_key_header_value, TestHarness};
use serde_json::json;

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness.server.get(&harness.user_path("balance")).await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn wrong_api_key_is_unauthorized() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&harness.user_path("balance"))
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("not-the-key"),
        )
        .await;

    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "unauthorized");
}

// ============================================================================
// Customers and balance
// ============================================================================

#[tokio::test]
async fn ensure_customer_is_idempotent() {
    let harness = TestHarness::new();

    let first = harness.customer_id().await;
    let second = harness.customer_id().await;

    assert_eq!(first, second);
    assert_eq!(harness.provider.customer_count().await, 1);
}

#[tokio::test]
async fn new_customer_has_zero_balance() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get(&harness.user_path("balance"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance_cents"], 0);
    assert_eq!(body["available_credits_cents"], 0);
    assert_eq!(body["available_formatted"], "$0.00");
}

#[tokio::test]
async fn invalid_user_id_is_bad_request() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/users/bad'id/balance")
        .add_header(api_key_header_name(), api_key_header_value())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Initial credits
// ============================================================================

#[tokio::test]
async fn initial_credits_granted_once() {
    let harness = TestHarness::new();

    let first = harness
        .server
        .post(&harness.user_path("initial-credits"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await;
    first.assert_status_ok();
    let body: serde_json::Value = first.json();
    assert_eq!(body["applied"], true);
    assert_eq!(body["available_credits_cents"], 500);

    let second = harness
        .server
        .post(&harness.user_path("initial-credits"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await;
    second.assert_status_ok();
    let body: serde_json::Value = second.json();
    assert_eq!(body["applied"], false);

    let balance: serde_json::Value = harness
        .server
        .get(&harness.user_path("balance"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await
        .json();
    assert_eq!(balance["available_credits_cents"], 500);
    assert_eq!(balance["balance_cents"], -500);
}

// ============================================================================
// Consumption
// ============================================================================

#[tokio::test]
async fn consume_reduces_balance() {
    let harness = TestHarness::new();
    harness
        .server
        .post(&harness.user_path("initial-credits"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post(&harness.user_path("consume"))
        .add_header(api_key_header_name(), api_key_header_value())
        .json(&json!({ "amount_cents": 42, "interaction_id": "msg_1" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["applied"], true);
    assert_eq!(body["available_credits_cents"], 458);
}

#[tokio::test]
async fn consume_is_deduplicated_by_interaction_id() {
    let harness = TestHarness::new();

    for _ in 0..2 {
        harness
            .server
            .post(&harness.user_path("consume"))
            .add_header(api_key_header_name(), api_key_header_value())
            .json(&json!({ "amount_cents": 10, "interaction_id": "msg_dup" }))
            .await
            .assert_status_ok();
    }

    let customer_id = harness.customer_id().await;
    assert_eq!(harness.provider.transactions(&customer_id).await.len(), 1);
}

#[tokio::test]
async fn consume_rejects_zero_amount() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(&harness.user_path("consume"))
        .add_header(api_key_header_name(), api_key_header_value())
        .json(&json!({ "amount_cents": 0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn consume_rejects_amount_above_stripe_maximum() {
    let harness = TestHarness::new();

    for _ in 0..2 {
        let response = harness
            .server
            .post(&harness.user_path("consume"))
            .add_header(api_key_header_name(), api_key_header_value())
            .json(&json!({ "amount_cents": i64::MAX }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    let customer_id = harness.customer_id().await;
    assert!(harness.provider.transactions(&customer_id).await.is_empty());
}

#[tokio::test]
async fn check_reports_sufficiency() {
    let harness = TestHarness::new();
    harness
        .server
        .post(&harness.user_path("initial-credits"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await
        .assert_status_ok();

    let enough: serde_json::Value = harness
        .server
        .post(&harness.user_path("check"))
        .add_header(api_key_header_name(), api_key_header_value())
        .json(&json!({ "required_cents": 100 }))
        .await
        .json();
    assert_eq!(enough["sufficient"], true);

    let short: serde_json::Value = harness
        .server
        .post(&harness.user_path("check"))
        .add_header(api_key_header_name(), api_key_header_value())
        .json(&json!({ "required_cents": 10_000 }))
        .await
        .json();
    assert_eq!(short["sufficient"], false);
    assert_eq!(short["available_credits_cents"], 500);
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn transactions_listed_newest_first() {
    let harness = TestHarness::new();
    harness
        .server
        .post(&harness.user_path("initial-credits"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await
        .assert_status_ok();
    harness
        .server
        .post(&harness.user_path("consume"))
        .add_header(api_key_header_name(), api_key_header_value())
        .json(&json!({ "amount_cents": 25 }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get(&harness.user_path("transactions"))
        .add_query_param("limit", 10)
        .add_header(api_key_header_name(), api_key_header_value())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let txs = body["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0]["credits_delta_cents"], -25);
    assert_eq!(txs[0]["available_after_cents"], 475);
    assert_eq!(txs[1]["event_type"], "initial_credits");
}

// ============================================================================
// Outages
// ============================================================================

#[tokio::test]
async fn provider_outage_is_service_unavailable() {
    let harness = TestHarness::new();
    harness.provider.set_available(false);

    let response = harness
        .server
        .get(&harness.user_path("balance"))
        .add_header(api_key_header_name(), api_key_header_value())
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn plans_are_listed() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/plans")
        .add_header(api_key_header_name(), api_key_header_value())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let ids: Vec<&str> = body["plans"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["standard", "pro"]);
    assert_eq!(body["initial_credits_cents"], 500);
}

//! Stripe REST client tests against a mock Stripe API.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agent_billing_core::{
    CustomerId, GrantOutcome, NewLedgerEntry, PlanCatalog, TriggeringEvent, UserId,
};
use agent_billing_service::provider::{BillingProvider, ProviderError};
use agent_billing_service::{CreditLedger, StripeClient};

const API_KEY: &str = "sk_test_123";
// base64("sk_test_123:")
const BASIC_AUTH: &str = "Basic c2tfdGVzdF8xMjM6";

fn client(server: &MockServer) -> StripeClient {
    StripeClient::with_base_url(API_KEY, server.uri()).unwrap()
}

fn customer_json(id: &str, user_id: &str, balance: i64, created: i64) -> serde_json::Value {
    json!({
        "id": id,
        "object": "customer",
        "balance": balance,
        "created": created,
        "email": null,
        "metadata": { "userId": user_id }
    })
}

fn balance_tx_json(id: &str, amount: i64, ending: i64, event_id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "object": "customer_balance_transaction",
        "amount": amount,
        "currency": "usd",
        "customer": "cus_1",
        "ending_balance": ending,
        "description": "Standard plan monthly credits",
        "created": 1_700_000_000,
        "metadata": {
            "triggeringEventId": event_id,
            "triggeringEventType": "monthly_credits"
        }
    })
}

#[tokio::test]
async fn search_uses_metadata_query_and_picks_oldest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/search"))
        .and(query_param("query", "metadata['userId']:'user_1'"))
        .and(header("authorization", BASIC_AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "search_result",
            "has_more": false,
            "data": [
                customer_json("cus_new", "user_1", 0, 1_700_000_100),
                customer_json("cus_old", "user_1", -500, 1_700_000_000)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user: UserId = "user_1".parse().unwrap();
    let found = client(&server)
        .find_customer_by_user(&user)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.id.as_str(), "cus_old");
    assert_eq!(found.available_credits(), 500);
}

#[tokio::test]
async fn create_customer_sends_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .and(header("idempotency-key", "customer-create-user_1"))
        .and(body_string_contains("metadata%5BuserId%5D=user_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(customer_json("cus_1", "user_1", 0, 1)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let user: UserId = "user_1".parse().unwrap();
    let created = BillingProvider::create_customer(&client(&server), &user, None)
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "cus_1");
    assert_eq!(created.user_id, Some(user));
}

#[tokio::test]
async fn keyed_create_form_does_not_depend_on_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .and(header("idempotency-key", "customer-create-user_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(customer_json("cus_1", "user_1", 0, 1)),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/customers/cus_1"))
        .and(body_string_contains("email=a%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cus_1",
            "object": "customer",
            "balance": 0,
            "created": 1,
            "email": "a@example.com",
            "metadata": { "userId": "user_1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user: UserId = "user_1".parse().unwrap();
    let stripe = client(&server);
    BillingProvider::create_customer(&stripe, &user, None)
        .await
        .unwrap();
    let with_email = BillingProvider::create_customer(&stripe, &user, Some("a@example.com"))
        .await
        .unwrap();
    assert_eq!(with_email.email.as_deref(), Some("a@example.com"));

    let creates: Vec<Vec<u8>> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/customers")
        .map(|r| r.body)
        .collect();
    assert_eq!(creates.len(), 2);
    assert_eq!(creates[0], creates[1]);
    assert!(!String::from_utf8_lossy(&creates[0]).contains("email"));
}

#[tokio::test]
async fn balance_transaction_carries_metadata_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers/cus_1/balance_transactions"))
        .and(header("idempotency-key", "monthly_credits-cus_1-in_1"))
        .and(body_string_contains("amount=-2500"))
        .and(body_string_contains("currency=usd"))
        .and(body_string_contains("metadata%5BtriggeringEventId%5D=in_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(balance_tx_json("cbtxn_1", -2500, -2500, "in_1")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let entry = BillingProvider::create_balance_transaction(
        &client(&server),
        &NewLedgerEntry {
            customer_id: "cus_1".parse().unwrap(),
            amount_cents: -2500,
            description: "Standard plan monthly credits".into(),
            event: Some(TriggeringEvent::monthly_credits("in_1")),
        },
    )
    .await
    .unwrap();

    assert_eq!(entry.id, "cbtxn_1");
    assert_eq!(entry.credits_delta(), 2500);
    assert!(entry.was_triggered_by("in_1"));
}

#[tokio::test]
async fn ledger_skips_grant_already_in_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/cus_1/balance_transactions"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "has_more": false,
            "data": [balance_tx_json("cbtxn_1", -2500, -2500, "in_1")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/customers/cus_1/balance_transactions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let ledger = CreditLedger::new(std::sync::Arc::new(client(&server)), PlanCatalog::default());
    let plan = ledger.catalog().get("standard").unwrap().clone();
    let customer: CustomerId = "cus_1".parse().unwrap();

    let outcome = ledger
        .grant_monthly_credits(&customer, "in_1", &plan)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        GrantOutcome::AlreadyApplied {
            existing_id: Some("cbtxn_1".into())
        }
    );
}

#[tokio::test]
async fn missing_customer_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/cus_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "resource_missing",
                "message": "No such customer: 'cus_missing'"
            }
        })))
        .mount(&server)
        .await;

    let id: CustomerId = "cus_missing".parse().unwrap();
    let found = BillingProvider::get_customer(&client(&server), &id).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn server_errors_map_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/cus_1/balance_transactions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "type": "api_error", "message": "Stripe is down" }
        })))
        .mount(&server)
        .await;

    let id: CustomerId = "cus_1".parse().unwrap();
    let err = BillingProvider::list_balance_transactions(&client(&server), &id, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)));
}

//! Stripe webhook integration tests.

mod common;

use axum::http::StatusCode;
use common::{stripe_event, test_config, TestHarness, WEBHOOK_SECRET};
use serde_json::json;

use agent_billing_core::{CustomerId, SUBSCRIPTION_STATUS_METADATA_KEY};
use agent_billing_service::provider::BillingProvider;
use agent_billing_service::stripe::signature::compute_signature;
use agent_billing_service::ServiceConfig;

fn paid_invoice(invoice_id: &str, customer_id: &CustomerId, price_id: &str) -> serde_json::Value {
    json!({
        "id": invoice_id,
        "object": "invoice",
        "customer": customer_id.as_str(),
        "billing_reason": "subscription_cycle",
        "amount_paid": 2000,
        "lines": {
            "object": "list",
            "has_more": false,
            "data": [{ "price": { "id": price_id } }]
        }
    })
}

async fn available_credits(harness: &TestHarness, customer_id: &CustomerId) -> i64 {
    harness
        .provider
        .get_customer(customer_id)
        .await
        .unwrap()
        .unwrap()
        .available_credits()
}

// ============================================================================
// Signature verification
// ============================================================================

#[tokio::test]
async fn missing_signature_is_bad_request() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text(stripe_event("evt_1", "invoice.paid", json!({})).to_string())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_signature_is_bad_request() {
    let harness = TestHarness::new();
    let body = stripe_event("evt_1", "invoice.paid", json!({})).to_string();
    let ts = chrono::Utc::now().timestamp();
    let forged = compute_signature("whsec_wrong", ts, &body);

    let response = harness
        .send_raw_webhook(body, &format!("t={ts},v1={forged}"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_signature_is_bad_request() {
    let harness = TestHarness::new();
    let body = stripe_event("evt_1", "ping", json!({})).to_string();
    let ts = chrono::Utc::now().timestamp() - 3600;
    let signature = compute_signature(WEBHOOK_SECRET, ts, &body);

    let response = harness
        .send_raw_webhook(body, &format!("t={ts},v1={signature}"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unconfigured_secret_is_service_unavailable() {
    let harness = TestHarness::with_config(ServiceConfig {
        stripe_webhook_secret: None,
        ..test_config()
    });

    let response = harness
        .send_webhook(&stripe_event("evt_1", "ping", json!({})))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_event_is_acknowledged() {
    let harness = TestHarness::new();

    let response = harness
        .send_webhook(&stripe_event("evt_1", "charge.refunded", json!({ "id": "ch_1" })))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], true);
}

// ============================================================================
// Invoices
// ============================================================================

#[tokio::test]
async fn paid_invoice_grants_monthly_credits_once() {
    let harness = TestHarness::new();
    let customer_id = harness.customer_id().await;
    let event = stripe_event(
        "evt_inv_1",
        "invoice.paid",
        paid_invoice("in_1", &customer_id, "price_standard_monthly"),
    );

    harness.send_webhook(&event).await.assert_status_ok();
    // Stripe retries the same delivery.
    harness.send_webhook(&event).await.assert_status_ok();

    assert_eq!(available_credits(&harness, &customer_id).await, 2500);
    assert_eq!(harness.provider.transactions(&customer_id).await.len(), 1);
}

#[tokio::test]
async fn payment_succeeded_alias_shares_idempotency_key() {
    let harness = TestHarness::new();
    let customer_id = harness.customer_id().await;
    let invoice = paid_invoice("in_2", &customer_id, "price_pro_monthly");

    harness
        .send_webhook(&stripe_event("evt_a", "invoice.paid", invoice.clone()))
        .await
        .assert_status_ok();
    harness
        .send_webhook(&stripe_event("evt_b", "invoice.payment_succeeded", invoice))
        .await
        .assert_status_ok();

    assert_eq!(available_credits(&harness, &customer_id).await, 6000);
}

#[tokio::test]
async fn invoice_for_unknown_price_is_acknowledged_without_credit() {
    let harness = TestHarness::new();
    let customer_id = harness.customer_id().await;

    harness
        .send_webhook(&stripe_event(
            "evt_inv_x",
            "invoice.paid",
            paid_invoice("in_x", &customer_id, "price_mystery"),
        ))
        .await
        .assert_status_ok();

    assert_eq!(available_credits(&harness, &customer_id).await, 0);
}

#[tokio::test]
async fn provider_outage_is_retryable() {
    let harness = TestHarness::new();
    let customer_id = harness.customer_id().await;
    harness.provider.set_available(false);

    let response = harness
        .send_webhook(&stripe_event(
            "evt_inv_3",
            "invoice.paid",
            paid_invoice("in_3", &customer_id, "price_standard_monthly"),
        ))
        .await;
    assert!(response.status_code().is_server_error());

    harness.provider.set_available(true);
    harness
        .send_webhook(&stripe_event(
            "evt_inv_3",
            "invoice.paid",
            paid_invoice("in_3", &customer_id, "price_standard_monthly"),
        ))
        .await
        .assert_status_ok();
    assert_eq!(available_credits(&harness, &customer_id).await, 2500);
}

// ============================================================================
// Checkout sessions
// ============================================================================

#[tokio::test]
async fn paid_checkout_grants_purchased_credits_once() {
    let harness = TestHarness::new();
    let customer_id = harness.customer_id().await;
    let event = stripe_event(
        "evt_cs_1",
        "checkout.session.completed",
        json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "mode": "payment",
            "payment_status": "paid",
            "customer": customer_id.as_str(),
            "amount_total": 1000,
            "client_reference_id": harness.test_user_id.as_str(),
            "metadata": { "creditsInUSDCents": "1000" }
        }),
    );

    harness.send_webhook(&event).await.assert_status_ok();
    harness.send_webhook(&event).await.assert_status_ok();

    assert_eq!(available_credits(&harness, &customer_id).await, 1000);
}

#[tokio::test]
async fn checkout_without_customer_resolves_user() {
    let harness = TestHarness::new();

    harness
        .send_webhook(&stripe_event(
            "evt_cs_2",
            "checkout.session.completed",
            json!({
                "id": "cs_test_2",
                "mode": "payment",
                "payment_status": "paid",
                "amount_total": 700,
                "client_reference_id": harness.test_user_id.as_str()
            }),
        ))
        .await
        .assert_status_ok();

    let customer_id = harness.customer_id().await;
    assert_eq!(available_credits(&harness, &customer_id).await, 700);
}

#[tokio::test]
async fn unpaid_or_subscription_checkout_grants_nothing() {
    let harness = TestHarness::new();
    let customer_id = harness.customer_id().await;

    for (id, mode, status) in [
        ("cs_unpaid", "payment", "unpaid"),
        ("cs_sub", "subscription", "paid"),
    ] {
        harness
            .send_webhook(&stripe_event(
                &format!("evt_{id}"),
                "checkout.session.completed",
                json!({
                    "id": id,
                    "mode": mode,
                    "payment_status": status,
                    "customer": customer_id.as_str(),
                    "amount_total": 2000
                }),
            ))
            .await
            .assert_status_ok();
    }

    assert!(harness.provider.transactions(&customer_id).await.is_empty());
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn subscription_lifecycle_updates_customer_metadata() {
    let harness = TestHarness::new();
    let customer_id = harness.customer_id().await;
    let subscription = |status: &str| {
        json!({
            "id": "sub_1",
            "object": "subscription",
            "customer": customer_id.as_str(),
            "status": status,
            "items": {
                "object": "list",
                "has_more": false,
                "data": [{ "price": { "id": "price_pro_monthly" } }]
            }
        })
    };

    harness
        .send_webhook(&stripe_event(
            "evt_sub_1",
            "customer.subscription.created",
            subscription("active"),
        ))
        .await
        .assert_status_ok();

    let customer = harness
        .provider
        .get_customer(&customer_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.plan_id(), Some("pro"));
    assert_eq!(customer.metadata[SUBSCRIPTION_STATUS_METADATA_KEY], "active");

    harness
        .send_webhook(&stripe_event(
            "evt_sub_2",
            "customer.subscription.deleted",
            subscription("canceled"),
        ))
        .await
        .assert_status_ok();

    let customer = harness
        .provider
        .get_customer(&customer_id)
        .await
        .unwrap()
        .unwrap();
    assert!(customer.plan_id().is_none());
    assert_eq!(customer.metadata[SUBSCRIPTION_STATUS_METADATA_KEY], "canceled");
}

#[tokio::test]
async fn payment_failed_is_acknowledged() {
    let harness = TestHarness::new();

    harness
        .send_webhook(&stripe_event(
            "evt_fail",
            "invoice.payment_failed",
            json!({ "id": "in_failed", "customer": "cus_123" }),
        ))
        .await
        .assert_status_ok();
}

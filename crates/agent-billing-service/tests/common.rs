//! Common test utilities for agent-billing integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestResponse, TestServer};

use agent_billing_core::{CustomerId, UserId};
use agent_billing_service::stripe::signature::compute_signature;
use agent_billing_service::{create_router, AppState, InMemoryProvider, ServiceConfig};

pub const SERVICE_API_KEY: &str = "test-service-key";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The in-memory billing backend behind the ledger.
    pub provider: Arc<InMemoryProvider>,
    /// A test user ID.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new harness with an empty in-memory ledger.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a harness with a custom configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let provider = Arc::new(InMemoryProvider::new());
        let state =
            AppState::with_provider(config, provider.clone()).expect("Failed to build state");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            provider,
            test_user_id: "user_test_1".parse().expect("valid user id"),
        }
    }

    /// Path under `/v1/users/{test_user_id}`.
    pub fn user_path(&self, suffix: &str) -> String {
        format!("/v1/users/{}/{suffix}", self.test_user_id)
    }

    /// Customer id of the test user, created on demand.
    pub async fn customer_id(&self) -> CustomerId {
        let response = self
            .server
            .post(&self.user_path("customer"))
            .add_header(api_key_header_name(), api_key_header_value())
            .json(&serde_json::json!({}))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["customer_id"]
            .as_str()
            .expect("customer_id in response")
            .parse()
            .expect("valid customer id")
    }

    /// Deliver a correctly signed webhook.
    pub async fn send_webhook(&self, payload: &serde_json::Value) -> TestResponse {
        let body = payload.to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = compute_signature(WEBHOOK_SECRET, timestamp, &body);
        self.send_raw_webhook(body, &format!("t={timestamp},v1={signature}"))
            .await
    }

    /// Deliver a webhook with an arbitrary signature header.
    pub async fn send_raw_webhook(&self, body: String, signature: &str) -> TestResponse {
        self.server
            .post("/webhooks/stripe")
            .add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(signature).expect("valid header value"),
            )
            .text(body)
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration used by the default harness.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        service_api_key: Some(SERVICE_API_KEY.into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        ..ServiceConfig::default()
    }
}

pub fn api_key_header_name() -> HeaderName {
    HeaderName::from_static("x-api-key")
}

pub fn api_key_header_value() -> HeaderValue {
    HeaderValue::from_static(SERVICE_API_KEY)
}

/// Build a Stripe event envelope.
pub fn stripe_event(id: &str, event_type: &str, object: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": chrono::Utc::now().timestamp(),
        "data": { "object": object }
    })
}

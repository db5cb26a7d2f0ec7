//! Agent billing HTTP client implementation.

use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use agent_billing_core::UserId;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, CheckBalanceRequest, CheckBalanceResponse,
    CheckoutResponse, ConsumeRequest, CreditCheckoutRequest, CustomerRequest, CustomerResponse,
    LedgerWriteResponse, ListTransactionsResponse, PlansResponse, SubscriptionCheckoutRequest,
};

/// Agent billing API client.
///
/// Provides methods for charging agent interactions, checking balances and
/// starting checkouts on behalf of platform users.
#[derive(Debug, Clone)]
pub struct AgentBillingClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl AgentBillingClient {
    /// Create a new agent billing client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the billing service (e.g., `"http://agent-billing:8080"`)
    /// * `api_key` - Service API key for authentication
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new agent billing client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        })
    }

    /// Find or create the billing customer for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn ensure_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<CustomerResponse, ClientError> {
        let request = CustomerRequest {
            email: email.map(String::from),
        };
        let response = self
            .post(&self.user_url(user_id, "customer"))
            .json(&request)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Get a user's current balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<BalanceResponse, ClientError> {
        let response = self
            .get(&self.user_url(user_id, "balance"))
            .send()
            .await?;

        handle_response(response).await
    }

    /// List a user's most recent ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<ListTransactionsResponse, ClientError> {
        let response = self
            .get(&self.user_url(user_id, "transactions"))
            .query(&[("limit", limit)])
            .send()
            .await?;

        handle_response(response).await
    }

    /// Charge credits for a completed agent interaction.
    ///
    /// Passing the interaction id makes retries safe: the service writes at
    /// most one transaction per id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn consume_credits(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        interaction_id: Option<&str>,
    ) -> Result<LedgerWriteResponse, ClientError> {
        let request = ConsumeRequest {
            amount_cents,
            interaction_id: interaction_id.map(String::from),
        };

        tracing::debug!(
            user_id = %user_id,
            amount_cents = amount_cents,
            interaction_id = ?interaction_id,
            "Reporting credit consumption"
        );

        let response = self
            .post(&self.user_url(user_id, "consume"))
            .json(&request)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Check if a user has sufficient balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn check_balance(
        &self,
        user_id: &UserId,
        required_cents: i64,
    ) -> Result<CheckBalanceResponse, ClientError> {
        let response = self
            .post(&self.user_url(user_id, "check"))
            .json(&CheckBalanceRequest { required_cents })
            .send()
            .await?;

        handle_response(response).await
    }

    /// Grant the one-time initial credits. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn grant_initial_credits(
        &self,
        user_id: &UserId,
    ) -> Result<LedgerWriteResponse, ClientError> {
        let response = self
            .post(&self.user_url(user_id, "initial-credits"))
            .send()
            .await?;

        handle_response(response).await
    }

    /// List subscription plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_plans(&self) -> Result<PlansResponse, ClientError> {
        let response = self
            .get(&format!("{}/v1/plans", self.base_url))
            .send()
            .await?;

        handle_response(response).await
    }

    /// Start a subscription checkout and return its hosted URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn create_subscription_checkout(
        &self,
        user_id: &UserId,
        plan_id: impl Into<String>,
    ) -> Result<CheckoutResponse, ClientError> {
        let request = SubscriptionCheckoutRequest {
            plan_id: plan_id.into(),
        };
        let response = self
            .post(&self.user_url(user_id, "checkout/subscription"))
            .json(&request)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Start a one-time credit purchase and return its hosted URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn create_credit_checkout(
        &self,
        user_id: &UserId,
        amount_usd: f64,
    ) -> Result<CheckoutResponse, ClientError> {
        let response = self
            .post(&self.user_url(user_id, "checkout/credits"))
            .json(&CreditCheckoutRequest { amount_usd })
            .send()
            .await?;

        handle_response(response).await
    }

    fn user_url(&self, user_id: &UserId, suffix: &str) -> String {
        // UserId excludes whitespace, quotes and backslashes, so it is path-safe.
        format!("{}/v1/users/{user_id}/{suffix}", self.base_url)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
    }

    fn post(&self, url: &str) -> RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
    }
}

/// Handle API response and convert errors.
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    // Try to parse error response
    let error_body: Result<ApiErrorResponse, _> = response.json().await;

    match error_body {
        Ok(api_error) => {
            let message = api_error.error.message;

            // Map specific error codes to typed errors
            match api_error.error.code.as_str() {
                "unauthorized" => Err(ClientError::Unauthorized),
                "bad_request" => Err(ClientError::InvalidRequest(message)),
                "service_unavailable" => Err(ClientError::Unavailable(message)),
                code => Err(ClientError::Api {
                    code: code.to_string(),
                    message,
                    status: status.as_u16(),
                }),
            }
        }
        Err(_) => Err(ClientError::Api {
            code: "unknown".to_string(),
            message: format!("HTTP {status}"),
            status: status.as_u16(),
        }),
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}

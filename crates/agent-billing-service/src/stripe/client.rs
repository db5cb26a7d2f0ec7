//! Stripe API client implementation.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use super::types::{
    CheckoutSession, Customer, CustomerBalanceTransaction, StripeErrorResponse, StripeList,
};

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error ({status}): {error_type} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Parameters for a customer balance transaction.
#[derive(Debug, Clone)]
pub struct BalanceTransactionParams<'a> {
    /// Signed amount in cents (negative credits the customer).
    pub amount_cents: i64,
    /// Description shown in the Stripe dashboard.
    pub description: &'a str,
    /// Metadata key/value pairs.
    pub metadata: &'a [(String, String)],
    /// Value for the `Idempotency-Key` header.
    pub idempotency_key: Option<&'a str>,
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Currency used for every balance transaction.
    const CURRENCY: &'static str = "usd";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        Self::with_base_url(api_key, Self::BASE_URL)
    }

    /// Create a client against a different API root (used for tests and proxies).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, StripeError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(StripeError::Configuration("Stripe API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StripeError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Search customers with Stripe's search query language.
    ///
    /// Search results lag writes by up to a minute.
    pub async fn search_customers(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<StripeList<Customer>, StripeError> {
        let limit = limit.clamp(1, 100).to_string();
        let response = self
            .get("/customers/search")
            .query(&[("query", query), ("limit", limit.as_str())])
            .send()
            .await?;

        handle_response(response).await
    }

    /// Create a new Stripe customer.
    ///
    /// Only the metadata is sent, so every retry under the same idempotency
    /// key carries identical parameters.
    ///
    /// # Arguments
    ///
    /// * `metadata` - Metadata to attach (must include the user link)
    /// * `idempotency_key` - Replays the original response for repeated calls
    pub async fn create_customer(
        &self,
        metadata: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<Customer, StripeError> {
        tracing::debug!(idempotency_key = ?idempotency_key, "Creating Stripe customer");

        let response = with_idempotency(self.post("/customers"), idempotency_key)
            .form(&metadata_params(metadata))
            .send()
            .await?;

        handle_response(response).await
    }

    /// Set a customer's email.
    pub async fn update_customer_email(
        &self,
        customer_id: &str,
        email: &str,
    ) -> Result<Customer, StripeError> {
        let response = self
            .post(&format!("/customers/{customer_id}"))
            .form(&[("email", email)])
            .send()
            .await?;

        handle_response(response).await
    }

    /// Get a customer by ID.
    pub async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, StripeError> {
        let response = self
            .get(&format!("/customers/{customer_id}"))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        handle_response(response).await.map(Some)
    }

    /// Merge metadata into a customer. Empty values delete the key.
    pub async fn update_customer_metadata(
        &self,
        customer_id: &str,
        metadata: &[(String, String)],
    ) -> Result<Customer, StripeError> {
        let response = self
            .post(&format!("/customers/{customer_id}"))
            .form(&metadata_params(metadata))
            .send()
            .await?;

        handle_response(response).await
    }

    /// Create a customer balance transaction.
    pub async fn create_balance_transaction(
        &self,
        customer_id: &str,
        params: &BalanceTransactionParams<'_>,
    ) -> Result<CustomerBalanceTransaction, StripeError> {
        let mut form = metadata_params(params.metadata);
        form.push(("amount".into(), params.amount_cents.to_string()));
        form.push(("currency".into(), Self::CURRENCY.to_string()));
        form.push(("description".into(), params.description.to_string()));

        tracing::debug!(
            customer_id = %customer_id,
            amount_cents = %params.amount_cents,
            idempotency_key = ?params.idempotency_key,
            "Creating Stripe balance transaction"
        );

        let response = with_idempotency(
            self.post(&format!("/customers/{customer_id}/balance_transactions")),
            params.idempotency_key,
        )
        .form(&form)
        .send()
        .await?;

        handle_response(response).await
    }

    /// List a customer's balance transactions, newest first.
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Stripe customer ID
    /// * `limit` - Maximum number of results (1-100)
    pub async fn list_balance_transactions(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<StripeList<CustomerBalanceTransaction>, StripeError> {
        let limit = limit.clamp(1, 100).to_string();
        let response = self
            .get(&format!("/customers/{customer_id}/balance_transactions"))
            .query(&[("limit", limit.as_str())])
            .send()
            .await?;

        handle_response(response).await
    }

    /// Create a Checkout session from pre-built form parameters.
    pub async fn create_checkout_session(
        &self,
        params: &[(String, String)],
    ) -> Result<CheckoutSession, StripeError> {
        let response = self
            .post("/checkout/sessions")
            .form(params)
            .send()
            .await?;

        handle_response(response).await
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .basic_auth(&self.api_key, Option::<&str>::None)
    }
}

fn with_idempotency(builder: RequestBuilder, key: Option<&str>) -> RequestBuilder {
    match key {
        Some(key) => builder.header("Idempotency-Key", key),
        None => builder,
    }
}

/// Encode metadata as Stripe's `metadata[key]=value` form fields.
fn metadata_params(metadata: &[(String, String)]) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{k}]"), v.clone()))
        .collect()
}

/// Handle API response and convert errors.
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    // Try to parse error response
    let error_body: Result<StripeErrorResponse, _> = response.json().await;

    match error_body {
        Ok(stripe_error) => Err(StripeError::Api {
            status: status.as_u16(),
            error_type: stripe_error.error.error_type,
            message: stripe_error.error.message,
            code: stripe_error.error.code,
        }),
        Err(_) => Err(StripeError::Api {
            status: status.as_u16(),
            error_type: "unknown".to_string(),
            message: format!("HTTP {status}"),
            code: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = StripeClient::new("sk_test_xxx").unwrap();
        assert_eq!(client.base_url, StripeClient::BASE_URL);
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(
            StripeClient::new(""),
            Err(StripeError::Configuration(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = StripeClient::with_base_url("sk_test_xxx", "http://localhost:12111/v1/").unwrap();
        assert_eq!(client.base_url, "http://localhost:12111/v1");
    }

    #[test]
    fn metadata_params_use_bracket_keys() {
        let params = metadata_params(&[("userId".into(), "user_1".into())]);
        assert_eq!(params, vec![("metadata[userId]".to_string(), "user_1".to_string())]);
    }
}

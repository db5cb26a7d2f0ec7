//! Billing provider abstraction.
//!
//! The ledger never talks to Stripe directly; it goes through
//! [`BillingProvider`], which exposes exactly the customer, balance-transaction
//! and checkout primitives the ledger needs. [`crate::stripe::StripeClient`]
//! is the production implementation and [`InMemoryProvider`] backs local
//! development and tests.

pub mod memory;

use async_trait::async_trait;

use agent_billing_core::{BillingCustomer, CustomerId, LedgerEntry, NewLedgerEntry, UserId};

pub use memory::InMemoryProvider;

/// Errors returned by a billing provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached or timed out.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request.
    #[error("provider rejected request: {message}")]
    Rejected {
        /// Provider error message.
        message: String,
        /// Provider error code, if any.
        code: Option<String>,
    },

    /// The referenced object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider returned something we could not interpret.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// What a checkout session sells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutKind {
    /// Recurring subscription to a catalog plan.
    Subscription {
        /// Catalog plan id.
        plan_id: String,
        /// Stripe price id of the plan.
        price_id: String,
    },
    /// One-time credit top-up.
    CreditPurchase {
        /// Amount charged, in cents.
        amount_cents: i64,
        /// Credits granted once the session completes.
        credits_cents: i64,
    },
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Customer paying.
    pub customer_id: CustomerId,
    /// Platform user (sent as `client_reference_id`).
    pub user_id: UserId,
    /// What is being bought.
    pub kind: CheckoutKind,
    /// Redirect after success.
    pub success_url: String,
    /// Redirect after cancel.
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLink {
    /// Session id (`cs_...`).
    pub session_id: String,
    /// Hosted checkout URL.
    pub url: String,
}

/// Customer ledger primitives offered by a billing provider.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Find the customer linked to a platform user.
    async fn find_customer_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<BillingCustomer>, ProviderError>;

    /// Create a customer linked to a platform user.
    async fn create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<BillingCustomer, ProviderError>;

    /// Fetch a customer. Deleted customers are reported as `None`.
    async fn get_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<BillingCustomer>, ProviderError>;

    /// Merge key/value pairs into a customer's metadata.
    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &[(&str, &str)],
    ) -> Result<BillingCustomer, ProviderError>;

    /// Append a signed balance transaction.
    async fn create_balance_transaction(
        &self,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, ProviderError>;

    /// List the most recent balance transactions, newest first.
    async fn list_balance_transactions(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, ProviderError>;

    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutLink, ProviderError>;
}

//! Request and response types for the agent billing client.

use serde::{Deserialize, Serialize};

pub use agent_billing_core::PlanDetails;

/// Get-or-create customer request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomerRequest {
    /// Email recorded on a newly created customer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Billing customer.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerResponse {
    /// Stripe customer id.
    pub customer_id: String,
    /// Linked platform user.
    pub user_id: Option<String>,
    /// Customer email.
    pub email: Option<String>,
    /// Credits the customer can spend.
    pub available_credits_cents: i64,
    /// Whether the one-time initial grant was made.
    pub initial_credits_granted: bool,
    /// Current subscription plan, if any.
    pub plan_id: Option<String>,
}

/// Balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Stripe customer id.
    pub customer_id: String,
    /// Raw Stripe balance (negative = credit available).
    pub balance_cents: i64,
    /// Credits the customer can spend.
    pub available_credits_cents: i64,
    /// Available credits formatted as dollars.
    pub available_formatted: String,
}

/// A ledger entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResponse {
    /// Stripe balance transaction id.
    pub id: String,
    /// Signed Stripe amount in cents (negative = credit granted).
    pub amount_cents: i64,
    /// Change in available credits.
    pub credits_delta_cents: i64,
    /// Available credits after this transaction.
    pub available_after_cents: i64,
    /// Description.
    pub description: Option<String>,
    /// Triggering event type, when recorded.
    pub event_type: Option<String>,
    /// Triggering event id, when recorded.
    pub event_id: Option<String>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

/// Transaction history.
#[derive(Debug, Clone, Deserialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
}

/// Consume credits request.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeRequest {
    /// Credits to consume, in cents.
    pub amount_cents: i64,
    /// Agent interaction id used to deduplicate retries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
}

/// Result of a ledger write (consumption or initial grant).
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerWriteResponse {
    /// Whether this call wrote a transaction.
    pub applied: bool,
    /// The written (or previously written) transaction, when known.
    pub transaction_id: Option<String>,
    /// Available credits after the write, when known.
    pub available_credits_cents: Option<i64>,
}

/// Check balance request.
#[derive(Debug, Clone, Serialize)]
pub struct CheckBalanceRequest {
    /// Required amount in cents.
    pub required_cents: i64,
}

/// Check balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckBalanceResponse {
    /// Credits the customer can spend.
    pub available_credits_cents: i64,
    /// Amount that was checked.
    pub required_cents: i64,
    /// Whether the balance covers the requirement.
    pub sufficient: bool,
}

/// Plan catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct PlansResponse {
    /// Available subscription plans.
    pub plans: Vec<PlanDetails>,
    /// Credits granted once to every new customer.
    pub initial_credits_cents: i64,
}

/// Subscription checkout request.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionCheckoutRequest {
    /// Catalog plan id.
    pub plan_id: String,
}

/// Credit top-up request.
#[derive(Debug, Clone, Serialize)]
pub struct CreditCheckoutRequest {
    /// Amount in dollars ($5 to $1000).
    pub amount_usd: f64,
}

/// Hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutResponse {
    /// URL to redirect the user to.
    pub checkout_url: String,
    /// Session ID for tracking.
    pub session_id: String,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

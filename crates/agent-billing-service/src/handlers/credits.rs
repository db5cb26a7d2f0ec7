//! Customer, balance and ledger handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use agent_billing_core::{available_credits, BillingCustomer, GrantOutcome, LedgerEntry};

use super::{format_usd, ledger, parse_user_id};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::ledger::{BalanceCheck, DEFAULT_TRANSACTION_LIMIT};
use crate::state::AppState;

/// Get-or-create customer request.
#[derive(Debug, Default, Deserialize)]
pub struct CustomerRequest {
    /// Email recorded on a newly created customer.
    #[serde(default)]
    pub email: Option<String>,
}

/// Customer response.
#[derive(Debug, Serialize)]
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

impl From<&BillingCustomer> for CustomerResponse {
    fn from(customer: &BillingCustomer) -> Self {
        Self {
            customer_id: customer.id.to_string(),
            user_id: customer.user_id.as_ref().map(ToString::to_string),
            email: customer.email.clone(),
            available_credits_cents: customer.available_credits(),
            initial_credits_granted: customer.initial_credits_granted(),
            plan_id: customer.plan_id().map(String::from),
        }
    }
}

/// Find or create the billing customer for a user.
pub async fn ensure_customer(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<CustomerRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let customer = ledger(&state)?
        .get_or_create_customer(&user_id, body.email.as_deref())
        .await?;
    Ok(Json(CustomerResponse::from(&customer)))
}

/// Balance response.
#[derive(Debug, Serialize)]
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

/// Get current credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let balance = ledger(&state)?.get_balance(&user_id).await?;

    Ok(Json(BalanceResponse {
        customer_id: balance.customer_id.to_string(),
        balance_cents: balance.balance_cents,
        available_credits_cents: balance.available_credits_cents,
        available_formatted: format_usd(balance.available_credits_cents),
    }))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 20, max: 100).
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_TRANSACTION_LIMIT
}

/// Transaction response.
#[derive(Debug, Serialize)]
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
    /// Timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for TransactionResponse {
    fn from(entry: &LedgerEntry) -> Self {
        let event = entry.triggering_event();
        Self {
            id: entry.id.clone(),
            amount_cents: entry.amount_cents,
            credits_delta_cents: entry.credits_delta(),
            available_after_cents: available_credits(entry.ending_balance_cents),
            description: entry.description.clone(),
            event_type: event.as_ref().map(|e| e.event_type.to_string()),
            event_id: event.map(|e| e.id),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
}

/// List transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let entries = ledger(&state)?
        .list_transactions(&user_id, query.limit)
        .await?;

    Ok(Json(ListTransactionsResponse {
        transactions: entries.iter().map(TransactionResponse::from).collect(),
    }))
}

/// Ledger write response, shared by consumption and the initial grant.
#[derive(Debug, Serialize)]
pub struct LedgerWriteResponse {
    /// Whether this call wrote a transaction.
    pub applied: bool,
    /// The written (or previously written) transaction, when known.
    pub transaction_id: Option<String>,
    /// Available credits after the write, when known.
    pub available_credits_cents: Option<i64>,
}

impl From<GrantOutcome> for LedgerWriteResponse {
    fn from(outcome: GrantOutcome) -> Self {
        match outcome {
            GrantOutcome::Granted { entry } => Self {
                applied: true,
                available_credits_cents: Some(available_credits(entry.ending_balance_cents)),
                transaction_id: Some(entry.id),
            },
            GrantOutcome::AlreadyApplied { existing_id } => Self {
                applied: false,
                transaction_id: existing_id,
                available_credits_cents: None,
            },
        }
    }
}

/// Consume credits request.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// Credits to consume, in cents.
    pub amount_cents: i64,
    /// Agent interaction id; repeated requests with the same id are no-ops.
    #[serde(default)]
    pub interaction_id: Option<String>,
}

/// Consume credits for a completed agent interaction.
pub async fn consume_credits(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<ConsumeRequest>,
) -> Result<Json<LedgerWriteResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let outcome = ledger(&state)?
        .consume_credits(&user_id, body.amount_cents, body.interaction_id.as_deref())
        .await?;

    tracing::debug!(
        user_id = %user_id,
        service = %auth.service_name,
        amount_cents = body.amount_cents,
        applied = outcome.is_granted(),
        "Consumption recorded"
    );

    Ok(Json(outcome.into()))
}

/// Balance check request.
#[derive(Debug, Deserialize)]
pub struct CheckBalanceRequest {
    /// Credits the caller intends to spend, in cents.
    pub required_cents: i64,
}

/// Check whether the user can afford an operation.
pub async fn check_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<CheckBalanceRequest>,
) -> Result<Json<BalanceCheck>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let check = ledger(&state)?
        .check_balance(&user_id, body.required_cents)
        .await?;
    Ok(Json(check))
}

/// Grant the one-time initial credits.
pub async fn grant_initial_credits(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<LedgerWriteResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let outcome = ledger(&state)?.grant_initial_credits(&user_id).await?;
    Ok(Json(outcome.into()))
}

//! [`BillingProvider`] implementation backed by the Stripe API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use agent_billing_core::{
    BillingCustomer, CustomerId, LedgerEntry, NewLedgerEntry, UserId,
    PLAN_ID_METADATA_KEY, USER_ID_METADATA_KEY,
};

use super::client::{BalanceTransactionParams, StripeClient, StripeError};
use super::types::{Customer, CustomerBalanceTransaction};
use crate::provider::{BillingProvider, CheckoutKind, CheckoutLink, CheckoutRequest, ProviderError};

/// Product name shown on credit top-up checkouts.
const CREDIT_PRODUCT_NAME: &str = "Agent credits";

/// Checkout session metadata key carrying the credits to grant.
pub const CREDITS_METADATA_KEY: &str = "creditsInUSDCents";

impl From<StripeError> for ProviderError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::Http(e) if e.is_decode() => Self::InvalidResponse(e.to_string()),
            StripeError::Http(e) => Self::Unavailable(e.to_string()),
            StripeError::Api { status: 404, message, .. } => Self::NotFound(message),
            StripeError::Api { status, message, .. } if status == 429 || status >= 500 => {
                Self::Unavailable(message)
            }
            StripeError::Api { message, code, .. } => Self::Rejected { message, code },
            StripeError::Configuration(msg) => Self::Unavailable(msg),
        }
    }
}

/// Convert a Stripe customer into the ledger's view.
fn to_billing_customer(customer: Customer) -> Result<BillingCustomer, ProviderError> {
    let id: CustomerId = customer
        .id
        .parse()
        .map_err(|e| ProviderError::InvalidResponse(format!("customer id {}: {e}", customer.id)))?;

    // A malformed link is reported as unlinked rather than failing the read.
    let user_id = customer
        .metadata
        .get(USER_ID_METADATA_KEY)
        .and_then(|raw| raw.parse::<UserId>().ok());

    Ok(BillingCustomer {
        id,
        user_id,
        email: customer.email,
        balance_cents: customer.balance,
        metadata: customer.metadata,
    })
}

fn to_ledger_entry(tx: CustomerBalanceTransaction) -> Result<LedgerEntry, ProviderError> {
    let customer_id: CustomerId = tx
        .customer
        .parse()
        .map_err(|e| ProviderError::InvalidResponse(format!("customer id {}: {e}", tx.customer)))?;
    let created_at = DateTime::<Utc>::from_timestamp(tx.created, 0).ok_or_else(|| {
        ProviderError::InvalidResponse(format!("invalid timestamp {}", tx.created))
    })?;

    Ok(LedgerEntry {
        id: tx.id,
        customer_id,
        amount_cents: tx.amount,
        ending_balance_cents: tx.ending_balance,
        description: tx.description,
        metadata: tx.metadata,
        created_at,
    })
}

fn owned_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Build the form parameters for a Checkout session.
fn checkout_params(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("customer".to_string(), request.customer_id.to_string()),
        ("client_reference_id".to_string(), request.user_id.to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            format!("metadata[{USER_ID_METADATA_KEY}]"),
            request.user_id.to_string(),
        ),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
    ];

    match &request.kind {
        CheckoutKind::Subscription { plan_id, price_id } => {
            params.extend([
                ("mode".to_string(), "subscription".to_string()),
                ("line_items[0][price]".to_string(), price_id.clone()),
                (format!("metadata[{PLAN_ID_METADATA_KEY}]"), plan_id.clone()),
                (
                    format!("subscription_data[metadata][{PLAN_ID_METADATA_KEY}]"),
                    plan_id.clone(),
                ),
                (
                    format!("subscription_data[metadata][{USER_ID_METADATA_KEY}]"),
                    request.user_id.to_string(),
                ),
            ]);
        }
        CheckoutKind::CreditPurchase {
            amount_cents,
            credits_cents,
        } => {
            params.extend([
                ("mode".to_string(), "payment".to_string()),
                (
                    "line_items[0][price_data][currency]".to_string(),
                    "usd".to_string(),
                ),
                (
                    "line_items[0][price_data][product_data][name]".to_string(),
                    CREDIT_PRODUCT_NAME.to_string(),
                ),
                (
                    "line_items[0][price_data][unit_amount]".to_string(),
                    amount_cents.to_string(),
                ),
                (
                    format!("metadata[{CREDITS_METADATA_KEY}]"),
                    credits_cents.to_string(),
                ),
            ]);
        }
    }

    params
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn find_customer_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<BillingCustomer>, ProviderError> {
        // UserId rejects quotes and backslashes, so it can be embedded verbatim.
        let query = format!("metadata['{USER_ID_METADATA_KEY}']:'{user_id}'");
        let results = self.search_customers(&query, 10).await?;

        if results.data.len() > 1 {
            tracing::warn!(
                user_id = %user_id,
                matches = results.data.len(),
                "Multiple Stripe customers linked to one user, using the oldest"
            );
        }

        results
            .data
            .into_iter()
            .filter(|c| !c.deleted)
            .min_by_key(|c| c.created)
            .map(to_billing_customer)
            .transpose()
    }

    async fn create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<BillingCustomer, ProviderError> {
        let metadata = vec![(USER_ID_METADATA_KEY.to_string(), user_id.to_string())];
        let idempotency_key = format!("customer-create-{user_id}");
        let mut customer =
            StripeClient::create_customer(self, &metadata, Some(&idempotency_key)).await?;

        if let Some(email) = email {
            if customer.email.as_deref() != Some(email) {
                customer = self.update_customer_email(&customer.id, email).await?;
            }
        }
        to_billing_customer(customer)
    }

    async fn get_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<BillingCustomer>, ProviderError> {
        match StripeClient::get_customer(self, customer_id.as_str()).await? {
            Some(customer) if !customer.deleted => to_billing_customer(customer).map(Some),
            _ => Ok(None),
        }
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &[(&str, &str)],
    ) -> Result<BillingCustomer, ProviderError> {
        let customer = StripeClient::update_customer_metadata(
            self,
            customer_id.as_str(),
            &owned_pairs(metadata),
        )
        .await?;
        to_billing_customer(customer)
    }

    async fn create_balance_transaction(
        &self,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, ProviderError> {
        let metadata: Vec<(String, String)> = entry
            .event
            .as_ref()
            .map(|e| e.to_metadata().into_iter().collect())
            .unwrap_or_default();
        let idempotency_key = entry.idempotency_key();

        let tx = StripeClient::create_balance_transaction(
            self,
            entry.customer_id.as_str(),
            &BalanceTransactionParams {
                amount_cents: entry.amount_cents,
                description: &entry.description,
                metadata: &metadata,
                idempotency_key: idempotency_key.as_deref(),
            },
        )
        .await?;
        to_ledger_entry(tx)
    }

    async fn list_balance_transactions(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, ProviderError> {
        StripeClient::list_balance_transactions(self, customer_id.as_str(), limit)
            .await?
            .data
            .into_iter()
            .map(to_ledger_entry)
            .collect()
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutLink, ProviderError> {
        let session = StripeClient::create_checkout_session(self, &checkout_params(request)).await?;
        let url = session.url.ok_or_else(|| {
            ProviderError::InvalidResponse("Stripe returned no checkout URL".into())
        })?;
        Ok(CheckoutLink {
            session_id: session.id,
            url,
        })
    }
}

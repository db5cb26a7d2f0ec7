//! In-memory billing provider.
//!
//! Mirrors the Stripe behaviour the ledger relies on: customer metadata,
//! running cash balance, newest-first transaction listing and replay of
//! requests that reuse an idempotency key. Selected with
//! `LEDGER_BACKEND=memory` for local development; state is lost on restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use agent_billing_core::{
    BillingCustomer, CustomerId, LedgerEntry, NewLedgerEntry, UserId, USER_ID_METADATA_KEY,
};

use super::{BillingProvider, CheckoutKind, CheckoutLink, CheckoutRequest, ProviderError};

#[derive(Debug, Default)]
struct Inner {
    customers: HashMap<CustomerId, BillingCustomer>,
    transactions: HashMap<CustomerId, Vec<LedgerEntry>>,
    idempotent_writes: HashMap<String, LedgerEntry>,
    sessions: Vec<CheckoutRequest>,
}

/// Billing provider that keeps all state in process memory.
#[derive(Debug)]
pub struct InMemoryProvider {
    inner: Mutex<Inner>,
    available: AtomicBool,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of customers created so far.
    pub async fn customer_count(&self) -> usize {
        self.inner.lock().await.customers.len()
    }

    /// All transactions for a customer, newest first.
    pub async fn transactions(&self, customer_id: &CustomerId) -> Vec<LedgerEntry> {
        self.inner
            .lock()
            .await
            .transactions
            .get(customer_id)
            .map(|txs| txs.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    /// Checkout sessions requested so far, oldest first.
    pub async fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.inner.lock().await.sessions.clone()
    }

    fn ensure_available(&self) -> Result<(), ProviderError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::Unavailable(
                "in-memory provider marked unavailable".into(),
            ))
        }
    }
}

fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl BillingProvider for InMemoryProvider {
    async fn find_customer_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<BillingCustomer>, ProviderError> {
        self.ensure_available()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .customers
            .values()
            .find(|c| c.user_id.as_ref() == Some(user_id))
            .cloned())
    }

    async fn create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<BillingCustomer, ProviderError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;

        // Same outcome as Stripe replaying a create with the same idempotency key.
        if let Some(existing) = inner
            .customers
            .values()
            .find(|c| c.user_id.as_ref() == Some(user_id))
        {
            return Ok(existing.clone());
        }

        let id: CustomerId = generate_id("cus")
            .parse()
            .map_err(|e| ProviderError::InvalidResponse(format!("{e}")))?;
        let customer = BillingCustomer {
            id: id.clone(),
            user_id: Some(user_id.clone()),
            email: email.map(String::from),
            balance_cents: 0,
            metadata: HashMap::from([(
                USER_ID_METADATA_KEY.to_string(),
                user_id.to_string(),
            )]),
        };
        inner.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<BillingCustomer>, ProviderError> {
        self.ensure_available()?;
        Ok(self.inner.lock().await.customers.get(customer_id).cloned())
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &[(&str, &str)],
    ) -> Result<BillingCustomer, ProviderError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;
        let customer = inner
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| ProviderError::NotFound(customer_id.to_string()))?;

        for (key, value) in metadata {
            // Stripe deletes a metadata key when it is set to an empty string.
            if value.is_empty() {
                customer.metadata.remove(*key);
            } else {
                customer
                    .metadata
                    .insert((*key).to_string(), (*value).to_string());
            }
        }
        Ok(customer.clone())
    }

    async fn create_balance_transaction(
        &self,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, ProviderError> {
        self.ensure_available()?;
        let mut inner = self.inner.lock().await;

        let idempotency_key = entry.idempotency_key();
        if let Some(existing) = idempotency_key
            .as_ref()
            .and_then(|key| inner.idempotent_writes.get(key))
        {
            return Ok(existing.clone());
        }

        let customer = inner
            .customers
            .get_mut(&entry.customer_id)
            .ok_or_else(|| ProviderError::NotFound(entry.customer_id.to_string()))?;
        customer.balance_cents = customer
            .balance_cents
            .checked_add(entry.amount_cents)
            .ok_or_else(|| ProviderError::Rejected {
                message: format!(
                    "balance of {} cannot absorb {}",
                    entry.customer_id, entry.amount_cents
                ),
                code: Some("balance_overflow".into()),
            })?;

        let written = LedgerEntry {
            id: generate_id("cbtxn"),
            customer_id: entry.customer_id.clone(),
            amount_cents: entry.amount_cents,
            ending_balance_cents: customer.balance_cents,
            description: Some(entry.description.clone()),
            metadata: entry
                .event
                .as_ref()
                .map(agent_billing_core::TriggeringEvent::to_metadata)
                .unwrap_or_default(),
            created_at: Utc::now(),
        };

        inner
            .transactions
            .entry(entry.customer_id.clone())
            .or_default()
            .push(written.clone());
        if let Some(key) = idempotency_key {
            inner.idempotent_writes.insert(key, written.clone());
        }
        Ok(written)
    }

    async fn list_balance_transactions(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, ProviderError> {
        self.ensure_available()?;
        let inner = self.inner.lock().await;
        if !inner.customers.contains_key(customer_id) {
            return Err(ProviderError::NotFound(customer_id.to_string()));
        }
        Ok(inner
            .transactions
            .get(customer_id)
            .map(|txs| {
                txs.iter()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutLink, ProviderError> {
        self.ensure_available()?;
        if let CheckoutKind::CreditPurchase { amount_cents, .. } = request.kind {
            if amount_cents <= 0 {
                return Err(ProviderError::Rejected {
                    message: "amount must be positive".into(),
                    code: Some("parameter_invalid_integer".into()),
                });
            }
        }

        let session_id = generate_id("cs");
        self.inner.lock().await.sessions.push(request.clone());
        Ok(CheckoutLink {
            url: format!("https://checkout.local/pay/{session_id}"),
            session_id,
        })
    }
}

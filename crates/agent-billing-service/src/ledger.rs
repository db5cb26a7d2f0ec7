//! Credit ledger operations on top of a [`BillingProvider`].
//!
//! Every write that carries a [`TriggeringEvent`] goes through the same
//! guard: the last [`IDEMPOTENCY_LOOKBACK`] balance transactions are listed
//! and the write is skipped when one of them already carries the event id.
//! The provider additionally receives an idempotency key, so two concurrent
//! deliveries of the same event collapse into one transaction at Stripe.

use std::sync::Arc;

use serde::Serialize;

use agent_billing_core::{
    consume_amount, find_applied, grant_amount, BillingCustomer, BillingError, CustomerId,
    GrantOutcome, LedgerEntry, NewLedgerEntry, PlanCatalog, PlanDetails, TriggeringEvent, UserId,
    IDEMPOTENCY_LOOKBACK, INITIAL_CREDITS_CENTS, INITIAL_CREDITS_GRANTED_KEY,
    PLAN_ID_METADATA_KEY, SUBSCRIPTION_STATUS_METADATA_KEY,
};

use crate::provider::{BillingProvider, CheckoutKind, CheckoutLink, CheckoutRequest, ProviderError};

/// Smallest credit top-up, in cents ($5).
pub const MIN_TOP_UP_CENTS: i64 = 500;

/// Largest credit top-up, in cents ($1000).
pub const MAX_TOP_UP_CENTS: i64 = 100_000;

/// Default number of transactions returned by [`CreditLedger::list_transactions`].
pub const DEFAULT_TRANSACTION_LIMIT: u32 = 20;

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Domain validation failed.
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// The billing provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A customer's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditBalance {
    /// Billing customer.
    pub customer_id: CustomerId,
    /// Raw Stripe balance (negative = credit available).
    pub balance_cents: i64,
    /// Credits the customer can spend.
    pub available_credits_cents: i64,
}

impl From<&BillingCustomer> for CreditBalance {
    fn from(customer: &BillingCustomer) -> Self {
        Self {
            customer_id: customer.id.clone(),
            balance_cents: customer.balance_cents,
            available_credits_cents: customer.available_credits(),
        }
    }
}

/// Result of a sufficient-balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    /// Credits the customer can spend.
    pub available_credits_cents: i64,
    /// Credits the caller intends to spend.
    pub required_cents: i64,
    /// Whether the available credits cover the requirement.
    pub sufficient: bool,
}

/// Redirect targets for hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutUrls {
    /// Where the customer lands after paying.
    pub success_url: String,
    /// Where the customer lands after cancelling.
    pub cancel_url: String,
}

/// Idempotent credit ledger for platform users.
pub struct CreditLedger {
    provider: Arc<dyn BillingProvider>,
    catalog: PlanCatalog,
}

impl CreditLedger {
    /// Create a ledger over a billing provider and plan catalog.
    #[must_use]
    pub fn new(provider: Arc<dyn BillingProvider>, catalog: PlanCatalog) -> Self {
        Self { provider, catalog }
    }

    /// The plan catalog in use.
    #[must_use]
    pub const fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Find the customer linked to `user_id`, creating it when absent.
    pub async fn get_or_create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<BillingCustomer, LedgerError> {
        if let Some(customer) = self.provider.find_customer_by_user(user_id).await? {
            return Ok(customer);
        }

        let customer = self.provider.create_customer(user_id, email).await?;
        tracing::info!(
            user_id = %user_id,
            customer_id = %customer.id,
            "Created billing customer"
        );
        Ok(customer)
    }

    /// Current balance of the user's customer.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<CreditBalance, LedgerError> {
        let customer = self.get_or_create_customer(user_id, None).await?;
        Ok(CreditBalance::from(&customer))
    }

    /// Whether the user can spend `required_cents`.
    pub async fn check_balance(
        &self,
        user_id: &UserId,
        required_cents: i64,
    ) -> Result<BalanceCheck, LedgerError> {
        if required_cents < 0 {
            return Err(BillingError::InvalidAmount(format!(
                "required amount must not be negative, got {required_cents}"
            ))
            .into());
        }

        let balance = self.get_balance(user_id).await?;
        Ok(BalanceCheck {
            available_credits_cents: balance.available_credits_cents,
            required_cents,
            sufficient: balance.available_credits_cents >= required_cents,
        })
    }

    /// Charge credits for an agent interaction.
    ///
    /// Consumption is not blocked by an insufficient balance; callers that
    /// need a hard stop use [`CreditLedger::check_balance`] first. When an
    /// interaction id is given, repeated calls for it are no-ops.
    pub async fn consume_credits(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        interaction_id: Option<&str>,
    ) -> Result<GrantOutcome, LedgerError> {
        let amount = consume_amount(amount_cents)?;
        let customer = self.get_or_create_customer(user_id, None).await?;

        let outcome = self
            .write_once(NewLedgerEntry {
                customer_id: customer.id.clone(),
                amount_cents: amount,
                description: "Agent interaction".to_string(),
                event: interaction_id.map(TriggeringEvent::agent_interaction),
            })
            .await?;

        if customer.available_credits() < amount_cents {
            tracing::warn!(
                user_id = %user_id,
                customer_id = %customer.id,
                available = customer.available_credits(),
                consumed = amount_cents,
                "Consumption exceeded available credits"
            );
        }

        Ok(outcome)
    }

    /// Grant the one-time signup credits.
    ///
    /// The customer metadata flag is checked first and set after the write.
    /// A crash between the two is covered by the ledger guard on retry.
    pub async fn grant_initial_credits(&self, user_id: &UserId) -> Result<GrantOutcome, LedgerError> {
        let customer = self.get_or_create_customer(user_id, None).await?;
        if customer.initial_credits_granted() {
            tracing::debug!(customer_id = %customer.id, "Initial credits already granted");
            return Ok(GrantOutcome::AlreadyApplied { existing_id: None });
        }

        let outcome = self
            .write_once(NewLedgerEntry {
                customer_id: customer.id.clone(),
                amount_cents: grant_amount(INITIAL_CREDITS_CENTS)?,
                description: "Initial credits".to_string(),
                event: Some(TriggeringEvent::initial_credits(&customer.id)),
            })
            .await?;

        self.provider
            .update_customer_metadata(&customer.id, &[(INITIAL_CREDITS_GRANTED_KEY, "true")])
            .await?;

        Ok(outcome)
    }

    /// Grant a plan's monthly credits for a paid invoice.
    pub async fn grant_monthly_credits(
        &self,
        customer_id: &CustomerId,
        invoice_id: &str,
        plan: &PlanDetails,
    ) -> Result<GrantOutcome, LedgerError> {
        self.write_once(NewLedgerEntry {
            customer_id: customer_id.clone(),
            amount_cents: grant_amount(plan.credits_in_usd_cents)?,
            description: format!("{} plan monthly credits", plan.name),
            event: Some(TriggeringEvent::monthly_credits(invoice_id)),
        })
        .await
    }

    /// Grant credits bought through a completed checkout session.
    pub async fn grant_purchased_credits(
        &self,
        customer_id: &CustomerId,
        session_id: &str,
        credits_cents: i64,
    ) -> Result<GrantOutcome, LedgerError> {
        self.write_once(NewLedgerEntry {
            customer_id: customer_id.clone(),
            amount_cents: grant_amount(credits_cents)?,
            description: "Credit purchase".to_string(),
            event: Some(TriggeringEvent::credit_purchase(session_id)),
        })
        .await
    }

    /// Most recent ledger entries for the user, newest first.
    pub async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let customer = self.get_or_create_customer(user_id, None).await?;
        let limit = limit.clamp(1, IDEMPOTENCY_LOOKBACK);
        Ok(self
            .provider
            .list_balance_transactions(&customer.id, limit)
            .await?)
    }

    /// Start a hosted checkout for a plan subscription.
    pub async fn create_subscription_checkout(
        &self,
        user_id: &UserId,
        plan_id: &str,
        urls: CheckoutUrls,
    ) -> Result<CheckoutLink, LedgerError> {
        let plan = self
            .catalog
            .get(plan_id)
            .ok_or_else(|| BillingError::UnknownPlan(plan_id.to_string()))?;
        let kind = CheckoutKind::Subscription {
            plan_id: plan.id.clone(),
            price_id: plan.price_id.clone(),
        };
        self.checkout(user_id, kind, urls).await
    }

    /// Start a hosted checkout for a one-time credit top-up.
    pub async fn create_credit_checkout(
        &self,
        user_id: &UserId,
        amount_cents: i64,
        urls: CheckoutUrls,
    ) -> Result<CheckoutLink, LedgerError> {
        if !(MIN_TOP_UP_CENTS..=MAX_TOP_UP_CENTS).contains(&amount_cents) {
            return Err(BillingError::InvalidAmount(format!(
                "top-up must be between {MIN_TOP_UP_CENTS} and {MAX_TOP_UP_CENTS} cents, got {amount_cents}"
            ))
            .into());
        }

        // Credits are 1:1 with the amount paid.
        let kind = CheckoutKind::CreditPurchase {
            amount_cents,
            credits_cents: amount_cents,
        };
        self.checkout(user_id, kind, urls).await
    }

    /// Record the customer's subscription plan and status.
    ///
    /// `plan_id = None` clears the stored plan.
    pub async fn record_subscription(
        &self,
        customer_id: &CustomerId,
        plan_id: Option<&str>,
        status: &str,
    ) -> Result<BillingCustomer, LedgerError> {
        let customer = self
            .provider
            .update_customer_metadata(
                customer_id,
                &[
                    (PLAN_ID_METADATA_KEY, plan_id.unwrap_or_default()),
                    (SUBSCRIPTION_STATUS_METADATA_KEY, status),
                ],
            )
            .await?;

        tracing::info!(
            customer_id = %customer_id,
            plan_id = ?plan_id,
            status = %status,
            "Recorded subscription state"
        );
        Ok(customer)
    }

    async fn checkout(
        &self,
        user_id: &UserId,
        kind: CheckoutKind,
        urls: CheckoutUrls,
    ) -> Result<CheckoutLink, LedgerError> {
        let customer = self.get_or_create_customer(user_id, None).await?;
        let link = self
            .provider
            .create_checkout_session(&CheckoutRequest {
                customer_id: customer.id,
                user_id: user_id.clone(),
                kind,
                success_url: urls.success_url,
                cancel_url: urls.cancel_url,
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            session_id = %link.session_id,
            "Checkout session created"
        );
        Ok(link)
    }

    /// Append an entry unless its triggering event was already applied.
    async fn write_once(&self, entry: NewLedgerEntry) -> Result<GrantOutcome, LedgerError> {
        if let Some(event) = &entry.event {
            let recent = self
                .provider
                .list_balance_transactions(&entry.customer_id, IDEMPOTENCY_LOOKBACK)
                .await?;

            if let Some(existing) = find_applied(&recent, &event.id) {
                tracing::info!(
                    customer_id = %entry.customer_id,
                    event_id = %event.id,
                    event_type = %event.event_type,
                    existing_id = %existing.id,
                    "Triggering event already applied, skipping"
                );
                return Ok(GrantOutcome::AlreadyApplied {
                    existing_id: Some(existing.id.clone()),
                });
            }
        }

        let written = self.provider.create_balance_transaction(&entry).await?;
        tracing::info!(
            customer_id = %entry.customer_id,
            transaction_id = %written.id,
            amount_cents = written.amount_cents,
            ending_balance_cents = written.ending_balance_cents,
            event_id = ?entry.event.as_ref().map(|e| e.id.as_str()),
            "Ledger entry written"
        );
        Ok(GrantOutcome::Granted { entry: written })
    }
}

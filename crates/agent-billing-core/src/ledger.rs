//! Credit ledger model.
//!
//! The ledger itself lives in Stripe: every grant or consumption is a customer
//! balance transaction. This module holds the provider-neutral view of those
//! entries, the sign convention, and the metadata used as idempotency key.
//!
//! # Sign convention
//!
//! Stripe stores a customer's cash balance as the amount the customer *owes*.
//! A **negative balance is credit available**, so:
//!
//! - granting `n` credits writes a transaction of `-n`
//! - consuming `n` credits writes a transaction of `+n`
//! - available credits are `-balance`

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BillingError;
use crate::ids::CustomerId;

/// Metadata key holding the id of the event that caused a transaction.
pub const TRIGGERING_EVENT_ID_KEY: &str = "triggeringEventId";

/// Metadata key holding the [`TriggeringEventType`] of a transaction.
pub const TRIGGERING_EVENT_TYPE_KEY: &str = "triggeringEventType";

/// Number of most recent transactions inspected by the idempotency guard.
pub const IDEMPOTENCY_LOOKBACK: u32 = 100;

/// Largest amount Stripe accepts on a single balance transaction ($999,999.99).
pub const MAX_TRANSACTION_CENTS: i64 = 99_999_999;

/// Credits available for a given Stripe balance.
#[must_use]
pub const fn available_credits(balance_cents: i64) -> i64 {
    balance_cents.saturating_neg()
}

/// Signed transaction amount for granting `credits`.
///
/// # Errors
///
/// Returns [`BillingError::InvalidAmount`] unless `credits` is in
/// `1..=MAX_TRANSACTION_CENTS`.
pub fn grant_amount(credits: i64) -> Result<i64, BillingError> {
    ensure_in_range(credits)?;
    Ok(-credits)
}

/// Signed transaction amount for consuming `credits`.
///
/// # Errors
///
/// Returns [`BillingError::InvalidAmount`] unless `credits` is in
/// `1..=MAX_TRANSACTION_CENTS`.
pub fn consume_amount(credits: i64) -> Result<i64, BillingError> {
    ensure_in_range(credits)?;
    Ok(credits)
}

fn ensure_in_range(credits: i64) -> Result<(), BillingError> {
    if credits <= 0 {
        return Err(BillingError::InvalidAmount(format!(
            "credit amount must be positive, got {credits}"
        )));
    }
    if credits > MAX_TRANSACTION_CENTS {
        return Err(BillingError::InvalidAmount(format!(
            "credit amount must be at most {MAX_TRANSACTION_CENTS}, got {credits}"
        )));
    }
    Ok(())
}

/// What caused a ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeringEventType {
    /// One-time welcome grant.
    InitialCredits,
    /// Subscription renewal, keyed on the Stripe invoice id.
    MonthlyCredits,
    /// One-time top-up, keyed on the Stripe checkout session id.
    CreditPurchase,
    /// Credits consumed by a completed agent interaction.
    AgentInteraction,
}

impl TriggeringEventType {
    /// Wire representation stored in Stripe metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialCredits => "initial_credits",
            Self::MonthlyCredits => "monthly_credits",
            Self::CreditPurchase => "credit_purchase",
            Self::AgentInteraction => "agent_interaction",
        }
    }
}

impl fmt::Display for TriggeringEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggeringEventType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_credits" => Ok(Self::InitialCredits),
            "monthly_credits" => Ok(Self::MonthlyCredits),
            "credit_purchase" => Ok(Self::CreditPurchase),
            "agent_interaction" => Ok(Self::AgentInteraction),
            other => Err(BillingError::UnknownEventType(other.to_string())),
        }
    }
}

/// The idempotency key attached to a ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggeringEvent {
    /// External event id (invoice id, checkout session id, interaction id).
    pub id: String,
    /// Kind of event.
    pub event_type: TriggeringEventType,
}

impl TriggeringEvent {
    /// Initial grant for a customer. There is exactly one per customer.
    #[must_use]
    pub fn initial_credits(customer_id: &CustomerId) -> Self {
        Self {
            id: format!("initial-{customer_id}"),
            event_type: TriggeringEventType::InitialCredits,
        }
    }

    /// Monthly grant for a paid invoice.
    #[must_use]
    pub fn monthly_credits(invoice_id: impl Into<String>) -> Self {
        Self {
            id: invoice_id.into(),
            event_type: TriggeringEventType::MonthlyCredits,
        }
    }

    /// Top-up grant for a completed checkout session.
    #[must_use]
    pub fn credit_purchase(session_id: impl Into<String>) -> Self {
        Self {
            id: session_id.into(),
            event_type: TriggeringEventType::CreditPurchase,
        }
    }

    /// Consumption for a completed agent interaction.
    #[must_use]
    pub fn agent_interaction(interaction_id: impl Into<String>) -> Self {
        Self {
            id: interaction_id.into(),
            event_type: TriggeringEventType::AgentInteraction,
        }
    }

    /// Metadata entries to store on the balance transaction.
    #[must_use]
    pub fn to_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            (TRIGGERING_EVENT_ID_KEY.to_string(), self.id.clone()),
            (
                TRIGGERING_EVENT_TYPE_KEY.to_string(),
                self.event_type.as_str().to_string(),
            ),
        ])
    }

    /// Recover the triggering event from transaction metadata.
    #[must_use]
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        let id = metadata.get(TRIGGERING_EVENT_ID_KEY)?;
        let event_type = metadata.get(TRIGGERING_EVENT_TYPE_KEY)?.parse().ok()?;
        Some(Self {
            id: id.clone(),
            event_type,
        })
    }

    /// Key sent as Stripe's `Idempotency-Key` header.
    ///
    /// Stripe scopes keys to the account, and interaction ids are only unique
    /// per user, so the customer is part of the key.
    #[must_use]
    pub fn idempotency_key(&self, customer_id: &CustomerId) -> String {
        format!("{}-{customer_id}-{}", self.event_type, self.id)
    }
}

/// A request to append a transaction to a customer's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    /// Customer whose balance changes.
    pub customer_id: CustomerId,
    /// Signed amount in cents (see the module-level sign convention).
    pub amount_cents: i64,
    /// Human-readable description.
    pub description: String,
    /// Idempotency key, if the write has one.
    pub event: Option<TriggeringEvent>,
}

impl NewLedgerEntry {
    /// Provider idempotency key for this write, if it has a triggering event.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<String> {
        self.event
            .as_ref()
            .map(|event| event.idempotency_key(&self.customer_id))
    }
}

/// A balance transaction as read back from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Provider transaction id (`cbtxn_...` on Stripe).
    pub id: String,
    /// Customer the entry belongs to.
    pub customer_id: CustomerId,
    /// Signed amount in cents.
    pub amount_cents: i64,
    /// Customer balance after this entry.
    pub ending_balance_cents: i64,
    /// Description, if any.
    #[serde(default)]
    pub description: Option<String>,
    /// Raw metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The triggering event recorded in metadata, if any.
    #[must_use]
    pub fn triggering_event(&self) -> Option<TriggeringEvent> {
        TriggeringEvent::from_metadata(&self.metadata)
    }

    /// Whether this entry was written for the given event id.
    #[must_use]
    pub fn was_triggered_by(&self, event_id: &str) -> bool {
        self.metadata
            .get(TRIGGERING_EVENT_ID_KEY)
            .is_some_and(|id| id == event_id)
    }

    /// Change in available credits caused by this entry.
    #[must_use]
    pub const fn credits_delta(&self) -> i64 {
        self.amount_cents.saturating_neg()
    }
}

/// Find an entry already written for `event_id` among recent entries.
#[must_use]
pub fn find_applied<'a>(entries: &'a [LedgerEntry], event_id: &str) -> Option<&'a LedgerEntry> {
    entries.iter().find(|entry| entry.was_triggered_by(event_id))
}

/// Result of an idempotent ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// A new transaction was written.
    Granted {
        /// The new entry.
        entry: LedgerEntry,
    },
    /// The triggering event had already been applied; nothing was written.
    AlreadyApplied {
        /// Id of the earlier transaction, when known.
        existing_id: Option<String>,
    },
}

impl GrantOutcome {
    /// Whether this call wrote a transaction.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

//! Core types for the agent billing credit ledger.
//!
//! This crate provides the foundational types shared by the service and its
//! client SDK:
//!
//! - **Identifiers**: `UserId`, `CustomerId`
//! - **Customers**: `BillingCustomer` and its metadata keys
//! - **Plans**: `PlanDetails`, `PlanCatalog`
//! - **Ledger**: `LedgerEntry`, `TriggeringEvent`, `GrantOutcome`
//!
//! # Credit Unit
//!
//! **1 credit = $0.01 (1 cent)**, held as Stripe customer cash balance.
//! A negative Stripe balance means credit is available to spend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod customer;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod plans;

pub use customer::{
    BillingCustomer, INITIAL_CREDITS_GRANTED_KEY, PLAN_ID_METADATA_KEY,
    SUBSCRIPTION_STATUS_METADATA_KEY, USER_ID_METADATA_KEY,
};
pub use error::{BillingError, Result};
pub use ids::{CustomerId, IdError, UserId};
pub use ledger::{
    available_credits, consume_amount, find_applied, grant_amount, GrantOutcome, LedgerEntry,
    NewLedgerEntry, TriggeringEvent, TriggeringEventType, IDEMPOTENCY_LOOKBACK,
    MAX_TRANSACTION_CENTS, TRIGGERING_EVENT_ID_KEY, TRIGGERING_EVENT_TYPE_KEY,
};
pub use plans::{
    parse_price_id_overrides, PlanCatalog, PlanDetails, INITIAL_CREDITS_CENTS,
    PRO_PLAN_CREDITS, PRO_PLAN_PRICE_CENTS, STANDARD_PLAN_CREDITS, STANDARD_PLAN_PRICE_CENTS,
};

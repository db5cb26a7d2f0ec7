//! Stripe integration for the credit ledger.
//!
//! Stripe handles:
//! - Customer registration, linked to platform users via metadata
//! - The credit ledger itself (customer balance transactions)
//! - Subscription and top-up checkouts
//! - Signed webhook delivery of payment events

pub mod client;
pub mod provider;
pub mod signature;
pub mod types;

pub use client::{BalanceTransactionParams, StripeClient, StripeError};
pub use provider::CREDITS_METADATA_KEY;
pub use signature::SignatureError;
pub use types::*;

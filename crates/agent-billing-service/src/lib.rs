//! Agent billing HTTP service.
//!
//! This crate runs the credit ledger for the agent dashboard:
//!
//! - Billing customers linked to platform users
//! - Credit balance, history and consumption
//! - Idempotent initial, monthly and purchased credit grants
//! - Subscription and top-up checkouts
//! - Signed Stripe webhooks
//!
//! # Ledger
//!
//! Stripe's customer cash balance is the ledger of record. The service keeps
//! no database; idempotency comes from triggering-event metadata on each
//! balance transaction.
//!
//! # Authentication
//!
//! `/v1` routes require the shared service API key in `X-API-Key`. The
//! webhook route is authenticated by its Stripe signature.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for the router

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod provider;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::{LedgerBackend, ServiceConfig};
pub use error::ApiError;
pub use ledger::{CreditLedger, LedgerError};
pub use provider::{BillingProvider, InMemoryProvider, ProviderError};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};

//! API handlers.

// Allow precision loss in handlers - amounts displayed are well within f64 precision
#![allow(clippy::cast_precision_loss)]

pub mod checkout;
pub mod credits;
pub mod health;
pub mod plans;
pub mod webhooks;

use std::sync::Arc;

use agent_billing_core::UserId;

use crate::error::ApiError;
use crate::ledger::CreditLedger;
use crate::state::AppState;

/// The configured ledger, or 503 when billing is not set up.
pub(crate) fn ledger(state: &AppState) -> Result<&Arc<CreditLedger>, ApiError> {
    state
        .ledger
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Billing backend not configured".into()))
}

/// Parse a user id taken from the request path.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid user id: {e}")))
}

/// Format cents as dollars for display.
pub(crate) fn format_usd(cents: i64) -> String {
    format!("${:.2}", cents as f64 / 100.0)
}

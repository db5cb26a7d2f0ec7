//! Hosted checkout handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ledger, parse_user_id};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::ledger::CheckoutUrls;
use crate::provider::CheckoutLink;
use crate::state::AppState;

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted checkout URL to redirect the user to.
    pub checkout_url: String,
    /// Session ID for tracking.
    pub session_id: String,
}

impl From<CheckoutLink> for CheckoutResponse {
    fn from(link: CheckoutLink) -> Self {
        Self {
            checkout_url: link.url,
            session_id: link.session_id,
        }
    }
}

/// Subscription checkout request.
#[derive(Debug, Deserialize)]
pub struct SubscriptionCheckoutRequest {
    /// Catalog plan id (e.g. `"pro"`).
    pub plan_id: String,
}

/// Start a subscription checkout.
pub async fn subscription_checkout(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<SubscriptionCheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    tracing::info!(
        user_id = %user_id,
        plan_id = %body.plan_id,
        "Initiating subscription checkout"
    );

    let link = ledger(&state)?
        .create_subscription_checkout(&user_id, &body.plan_id, redirect_urls(&state))
        .await?;
    Ok(Json(link.into()))
}

/// Credit top-up request.
#[derive(Debug, Deserialize)]
pub struct CreditCheckoutRequest {
    /// Amount in dollars to purchase ($5 to $1000).
    pub amount_usd: f64,
}

/// Start a one-time credit purchase.
pub async fn credit_checkout(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Json(body): Json<CreditCheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    // Validate amount
    if !body.amount_usd.is_finite() || body.amount_usd < 5.0 {
        return Err(ApiError::BadRequest("Minimum purchase is $5".into()));
    }
    if body.amount_usd > 1000.0 {
        return Err(ApiError::BadRequest("Maximum purchase is $1000".into()));
    }

    // Bounded above, so the cast cannot overflow.
    #[allow(clippy::cast_possible_truncation)]
    let amount_cents = (body.amount_usd * 100.0).round() as i64;

    tracing::info!(
        user_id = %user_id,
        amount_usd = %body.amount_usd,
        amount_cents = %amount_cents,
        "Initiating credit purchase"
    );

    let link = ledger(&state)?
        .create_credit_checkout(&user_id, amount_cents, redirect_urls(&state))
        .await?;
    Ok(Json(link.into()))
}

fn redirect_urls(state: &AppState) -> CheckoutUrls {
    let frontend = state.config.frontend_url.trim_end_matches('/');
    CheckoutUrls {
        success_url: format!("{frontend}/billing/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{frontend}/billing/cancel"),
    }
}

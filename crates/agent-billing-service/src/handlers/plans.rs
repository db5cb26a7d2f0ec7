//! Plan catalog handler.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use agent_billing_core::{PlanDetails, INITIAL_CREDITS_CENTS};

use crate::auth::ServiceAuth;
use crate::state::AppState;

/// Plan catalog response.
#[derive(Debug, Serialize)]
pub struct PlansResponse {
    /// Available subscription plans.
    pub plans: Vec<PlanDetails>,
    /// Credits granted once to every new customer.
    pub initial_credits_cents: i64,
}

/// List the subscription plans.
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
) -> Json<PlansResponse> {
    Json(PlansResponse {
        plans: state.catalog.plans().to_vec(),
        initial_credits_cents: INITIAL_CREDITS_CENTS,
    })
}

//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{checkout, credits, health, plans, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for consumption endpoints.
/// The agent runtime reports every interaction, so this is the hot path.
const USAGE_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Ledger (Service API Key auth)
/// - `GET /v1/plans` - Plan catalog
/// - `POST /v1/users/:user_id/customer` - Get or create billing customer
/// - `GET /v1/users/:user_id/balance` - Current balance
/// - `GET /v1/users/:user_id/transactions` - Ledger history
/// - `POST /v1/users/:user_id/initial-credits` - One-time signup grant
/// - `POST /v1/users/:user_id/checkout/subscription` - Subscription checkout
/// - `POST /v1/users/:user_id/checkout/credits` - Credit top-up checkout
///
/// ## Usage (Service API Key auth, own concurrency limit)
/// - `POST /v1/users/:user_id/consume` - Consume credits
/// - `POST /v1/users/:user_id/check` - Sufficient-balance check
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let usage_routes = Router::new()
        .route("/users/:user_id/consume", post(credits::consume_credits))
        .route("/users/:user_id/check", post(credits::check_balance))
        .layer(ConcurrencyLimitLayer::new(USAGE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/plans", get(plans::list_plans))
        .route("/users/:user_id/customer", post(credits::ensure_customer))
        .route("/users/:user_id/balance", get(credits::get_balance))
        .route("/users/:user_id/transactions", get(credits::list_transactions))
        .route(
            "/users/:user_id/initial-credits",
            post(credits::grant_initial_credits),
        )
        .route(
            "/users/:user_id/checkout/subscription",
            post(checkout::subscription_checkout),
        )
        .route(
            "/users/:user_id/checkout/credits",
            post(checkout::credit_checkout),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .merge(usage_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - controlled by Stripe)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

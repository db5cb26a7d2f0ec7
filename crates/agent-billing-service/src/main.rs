//! Agent billing service - credit ledger HTTP API.
//!
//! This is the main entry point for the agent-billing service.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_billing_service::{create_router, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agent_billing=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting agent billing service");

    // Load configuration from environment
    let config = ServiceConfig::from_env()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        ledger_backend = ?config.ledger_backend,
        stripe_configured = %config.stripe_api_key.is_some(),
        webhook_secret_configured = %config.stripe_webhook_secret.is_some(),
        price_overrides = config.price_ids.len(),
        "Service configuration loaded"
    );

    let state = AppState::new(config.clone())?;

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Application state.

use std::sync::Arc;

use agent_billing_core::{BillingError, PlanCatalog};

use crate::config::{LedgerBackend, ServiceConfig};
use crate::ledger::CreditLedger;
use crate::provider::{BillingProvider, InMemoryProvider};
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// Plan catalog with this environment's price ids bound.
    pub catalog: PlanCatalog,

    /// Credit ledger (absent when no billing backend is configured).
    pub ledger: Option<Arc<CreditLedger>>,
}

impl AppState {
    /// Create application state, selecting the ledger backend from config.
    pub fn new(config: ServiceConfig) -> Result<Self, BillingError> {
        let provider: Option<Arc<dyn BillingProvider>> = match config.ledger_backend {
            LedgerBackend::Memory => {
                tracing::warn!("Using in-memory ledger - balances are lost on restart");
                Some(Arc::new(InMemoryProvider::new()))
            }
            LedgerBackend::Stripe => config.stripe_api_key.as_ref().and_then(|key| {
                match StripeClient::new(key.clone()) {
                    Ok(client) => {
                        tracing::info!("Stripe integration enabled");
                        Some(Arc::new(client) as Arc<dyn BillingProvider>)
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to create Stripe client");
                        None
                    }
                }
            }),
        };

        if provider.is_none() {
            tracing::warn!("Stripe not configured - ledger endpoints will return 503");
        }

        Self::build(config, provider)
    }

    /// Create application state over an explicit provider.
    pub fn with_provider(
        config: ServiceConfig,
        provider: Arc<dyn BillingProvider>,
    ) -> Result<Self, BillingError> {
        Self::build(config, Some(provider))
    }

    fn build(
        config: ServiceConfig,
        provider: Option<Arc<dyn BillingProvider>>,
    ) -> Result<Self, BillingError> {
        let catalog = PlanCatalog::default().with_price_ids(&config.price_ids)?;
        let ledger = provider.map(|p| Arc::new(CreditLedger::new(p, catalog.clone())));

        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be refused");
        }

        Ok(Self {
            config,
            catalog,
            ledger,
        })
    }
}

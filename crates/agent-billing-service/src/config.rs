//! Service configuration.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use agent_billing_core::{parse_price_id_overrides, BillingError};

use crate::stripe::signature::DEFAULT_TOLERANCE_SECONDS;

/// Where ledger writes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerBackend {
    /// Stripe customer balance transactions.
    #[default]
    Stripe,
    /// Process memory, for local development.
    Memory,
}

impl FromStr for LedgerBackend {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(Self::Stripe),
            "memory" => Ok(Self::Memory),
            other => Err(BillingError::Configuration(format!(
                "LEDGER_BACKEND must be `stripe` or `memory`, got `{other}`"
            ))),
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret. Webhooks are refused without it.
    pub stripe_webhook_secret: Option<String>,

    /// Plan id to Stripe price id bindings for this environment.
    pub price_ids: HashMap<String, String>,

    /// Ledger backend (default: Stripe).
    pub ledger_backend: LedgerBackend,

    /// Frontend URL for checkout redirects.
    pub frontend_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Accepted webhook timestamp skew in seconds. Zero disables the check.
    pub webhook_tolerance_seconds: i64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    pub fn from_env() -> Result<Self, BillingError> {
        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();

        let price_ids = match std::env::var("STRIPE_PRICE_IDS") {
            Ok(raw) => parse_price_id_overrides(&raw)?,
            Err(_) => HashMap::new(),
        };

        let ledger_backend = match std::env::var("LEDGER_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => LedgerBackend::default(),
        };

        let defaults = Self::default();
        Ok(Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            stripe_api_key,
            stripe_webhook_secret,
            price_ids,
            ledger_backend,
            frontend_url: std::env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            webhook_tolerance_seconds: env_parse("WEBHOOK_TOLERANCE_SECONDS")
                .unwrap_or(defaults.webhook_tolerance_seconds),
        })
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "agent-billing/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (
                Some(secrets.api_key),
                secrets
                    .webhook_secret
                    .or_else(|| std::env::var("STRIPE_WEBHOOK_SECRET").ok()),
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            service_api_key: None,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            price_ids: HashMap::new(),
            ledger_backend: LedgerBackend::Stripe,
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            webhook_tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<LedgerBackend>().unwrap(), LedgerBackend::Memory);
        assert_eq!(" stripe ".parse::<LedgerBackend>().unwrap(), LedgerBackend::Stripe);
        assert!("sqlite".parse::<LedgerBackend>().is_err());
    }

    #[test]
    fn origins_skip_blanks() {
        assert_eq!(
            parse_origins("http://a.test, ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.webhook_tolerance_seconds, 300);
        assert_eq!(config.ledger_backend, LedgerBackend::Stripe);
        assert!(config.stripe_webhook_secret.is_none());
    }
}

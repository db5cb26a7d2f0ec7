//! Error types for agent billing.

use crate::ids::IdError;

/// Result type for agent billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in agent billing domain logic.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Amount is zero, negative, or out of range.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Plan id is not in the catalog.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// Triggering event type stored in metadata is not recognised.
    #[error("unknown triggering event type: {0}")]
    UnknownEventType(String),

    /// Customer not found at the billing provider.
    #[error("customer not found: {customer_id}")]
    CustomerNotFound {
        /// The customer ID that was not found.
        customer_id: String,
    },

    /// The external billing provider failed or rejected the request.
    #[error("billing provider error: {0}")]
    Provider(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

//! Client error types.

/// Errors that can occur when using the agent billing client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The service API key was rejected.
    #[error("unauthorized: service API key rejected")]
    Unauthorized,

    /// The request was invalid (bad amount, unknown plan, malformed id).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The billing backend is unavailable; the call may be retried.
    #[error("billing unavailable: {0}")]
    Unavailable(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Unavailable(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Unauthorized | Self::InvalidRequest(_) | Self::Configuration(_) => false,
        }
    }
}

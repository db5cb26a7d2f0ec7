//! Agent billing client SDK.
//!
//! This crate provides a client library for the dashboard backend and the
//! agent runtime to interact with the agent billing API.
//!
//! # Example
//!
//! ```no_run
//! use agent_billing_client::AgentBillingClient;
//! use agent_billing_core::UserId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AgentBillingClient::new(
//!     "http://agent-billing:8080",
//!     "your-service-api-key",
//! )?;
//! let user: UserId = "user_2abc".parse()?;
//!
//! // Charge a completed agent interaction
//! let write = client.consume_credits(&user, 42, Some("msg_123")).await?;
//!
//! println!("Credits left: {:?}", write.available_credits_cents);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{AgentBillingClient, ClientOptions};
pub use error::ClientError;
pub use types::*;

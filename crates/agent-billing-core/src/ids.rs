//! Identifier types for agent billing.
//!
//! Both identifiers are opaque strings issued by external systems: user ids
//! come from the dashboard's identity provider and customer ids from Stripe.
//!
//! # Macro-based ID Types
//!
//! The `string_id_type!` macro generates the shared serialization, parsing and
//! display boilerplate. Each type supplies its own `validate` function.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Macro to define a validated string identifier with standard trait implementations.
///
/// This macro generates a newtype wrapper around `String` with implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `Serialize`, `Deserialize` (as string, validated on the way in)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`, `AsRef<str>`
macro_rules! string_id_type {
    ($name:ident, $validate:path, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $validate(s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $validate(&value)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Maximum accepted identifier length.
const MAX_ID_LEN: usize = 255;

/// Prefix Stripe uses for customer ids.
const CUSTOMER_ID_PREFIX: &str = "cus_";

fn validate_user_id(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    // User ids are interpolated into Stripe search queries.
    if s
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '\'' | '"' | '\\'))
    {
        return Err(IdError::InvalidCharacter);
    }
    Ok(())
}

fn validate_customer_id(s: &str) -> Result<(), IdError> {
    validate_user_id(s)?;
    if !s.starts_with(CUSTOMER_ID_PREFIX) || s.len() == CUSTOMER_ID_PREFIX.len() {
        return Err(IdError::InvalidCustomerId);
    }
    Ok(())
}

string_id_type!(
    UserId,
    validate_user_id,
    "A platform user identifier.\n\nLinked 1:1 to a Stripe customer through the customer's `userId` metadata."
);
string_id_type!(
    CustomerId,
    validate_customer_id,
    "A Stripe customer identifier (`cus_...`)."
);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is empty.
    #[error("identifier is empty")]
    Empty,

    /// The input exceeds the maximum length.
    #[error("identifier is too long")]
    TooLong,

    /// The input contains whitespace, control or quote characters.
    #[error("identifier contains an invalid character")]
    InvalidCharacter,

    /// The input is not a Stripe customer id.
    #[error("invalid Stripe customer id")]
    InvalidCustomerId,
}

//! Billing customer view.
//!
//! A billing customer is a Stripe customer carrying the platform user id in its
//! metadata. The customer's cash balance is the credit ledger's running total.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{CustomerId, UserId};
use crate::ledger::available_credits;

/// Customer metadata key linking a Stripe customer to a platform user.
pub const USER_ID_METADATA_KEY: &str = "userId";

/// Customer metadata key set once the initial grant has been written.
pub const INITIAL_CREDITS_GRANTED_KEY: &str = "initialCreditsGranted";

/// Customer metadata key holding the current plan id.
pub const PLAN_ID_METADATA_KEY: &str = "planId";

/// Customer metadata key holding the current subscription status.
pub const SUBSCRIPTION_STATUS_METADATA_KEY: &str = "subscriptionStatus";

/// A billing customer as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCustomer {
    /// Provider customer id.
    pub id: CustomerId,
    /// Linked platform user, when the metadata carries a valid one.
    pub user_id: Option<UserId>,
    /// Customer email.
    pub email: Option<String>,
    /// Cash balance in cents (negative = credit available).
    pub balance_cents: i64,
    /// Raw customer metadata.
    pub metadata: HashMap<String, String>,
}

impl BillingCustomer {
    /// Credits the customer can spend.
    #[must_use]
    pub const fn available_credits(&self) -> i64 {
        available_credits(self.balance_cents)
    }

    /// Whether the one-time initial grant has been recorded.
    #[must_use]
    pub fn initial_credits_granted(&self) -> bool {
        self.metadata
            .get(INITIAL_CREDITS_GRANTED_KEY)
            .is_some_and(|v| v == "true")
    }

    /// Plan id recorded by the subscription webhooks.
    #[must_use]
    pub fn plan_id(&self) -> Option<&str> {
        self.metadata.get(PLAN_ID_METADATA_KEY).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(balance: i64, metadata: &[(&str, &str)]) -> BillingCustomer {
        BillingCustomer {
            id: "cus_1".parse().unwrap(),
            user_id: Some("user_1".parse().unwrap()),
            email: None,
            balance_cents: balance,
            metadata: metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn available_credits_follow_sign_convention() {
        assert_eq!(customer(-750, &[]).available_credits(), 750);
        assert_eq!(customer(25, &[]).available_credits(), -25);
    }

    #[test]
    fn initial_flag_requires_true() {
        assert!(!customer(0, &[]).initial_credits_granted());
        assert!(!customer(0, &[("initialCreditsGranted", "false")]).initial_credits_granted());
        assert!(customer(0, &[("initialCreditsGranted", "true")]).initial_credits_granted());
    }
}

//! Subscription plan catalog.
//!
//! Plans are a static table mapping a plan id to its monthly price, its
//! monthly credit allotment, and the Stripe price id customers subscribe to.
//! Stripe price ids differ between test and live mode, so the catalog ships
//! with placeholders that deployments override through configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::BillingError;

// ============================================================================
// Constants
// ============================================================================

/// Credits granted once to every new customer ($5).
pub const INITIAL_CREDITS_CENTS: i64 = 500;

/// Standard plan monthly price in cents ($20).
pub const STANDARD_PLAN_PRICE_CENTS: i64 = 2000;

/// Standard plan monthly credit allowance.
pub const STANDARD_PLAN_CREDITS: i64 = 2500;

/// Pro plan monthly price in cents ($50).
pub const PRO_PLAN_PRICE_CENTS: i64 = 5000;

/// Pro plan monthly credit allowance.
pub const PRO_PLAN_CREDITS: i64 = 6000;

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDetails {
    /// Stable plan identifier (e.g. `"pro"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Credits granted each billing period, in USD cents.
    pub credits_in_usd_cents: i64,
    /// Monthly price in USD cents.
    pub price_in_usd_cents: i64,
    /// Stripe price id for the recurring subscription.
    pub price_id: String,
}

/// Immutable lookup table of the available plans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: Vec<PlanDetails>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self {
            plans: vec![
                PlanDetails {
                    id: "standard".into(),
                    name: "Standard".into(),
                    credits_in_usd_cents: STANDARD_PLAN_CREDITS,
                    price_in_usd_cents: STANDARD_PLAN_PRICE_CENTS,
                    price_id: "price_standard_monthly".into(),
                },
                PlanDetails {
                    id: "pro".into(),
                    name: "Pro".into(),
                    credits_in_usd_cents: PRO_PLAN_CREDITS,
                    price_in_usd_cents: PRO_PLAN_PRICE_CENTS,
                    price_id: "price_pro_monthly".into(),
                },
            ],
        }
    }
}

impl PlanCatalog {
    /// Build a catalog from explicit entries.
    ///
    /// # Errors
    ///
    /// Returns an error if two plans share an id or a price id, or if a plan
    /// grants a negative number of credits.
    pub fn new(plans: Vec<PlanDetails>) -> Result<Self, BillingError> {
        for (i, plan) in plans.iter().enumerate() {
            if plan.credits_in_usd_cents < 0 || plan.price_in_usd_cents < 0 {
                return Err(BillingError::Configuration(format!(
                    "plan {} has a negative amount",
                    plan.id
                )));
            }
            if plans[..i]
                .iter()
                .any(|p| p.id == plan.id || p.price_id == plan.price_id)
            {
                return Err(BillingError::Configuration(format!(
                    "duplicate plan id or price id: {}",
                    plan.id
                )));
            }
        }
        Ok(Self { plans })
    }

    /// Look up a plan by id.
    #[must_use]
    pub fn get(&self, plan_id: &str) -> Option<&PlanDetails> {
        self.plans.iter().find(|p| p.id == plan_id)
    }

    /// Look up the plan a Stripe price id belongs to.
    #[must_use]
    pub fn find_by_price_id(&self, price_id: &str) -> Option<&PlanDetails> {
        self.plans.iter().find(|p| p.price_id == price_id)
    }

    /// All plans, in catalog order.
    #[must_use]
    pub fn plans(&self) -> &[PlanDetails] {
        &self.plans
    }

    /// Replace Stripe price ids with deployment-specific values.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::UnknownPlan`] if an override names a plan that
    /// is not in the catalog, or a configuration error if the result would
    /// contain duplicate price ids.
    pub fn with_price_ids(self, overrides: &HashMap<String, String>) -> Result<Self, BillingError> {
        if let Some(unknown) = overrides.keys().find(|id| self.get(id).is_none()) {
            return Err(BillingError::UnknownPlan(unknown.clone()));
        }

        let plans = self
            .plans
            .into_iter()
            .map(|mut plan| {
                if let Some(price_id) = overrides.get(&plan.id) {
                    plan.price_id.clone_from(price_id);
                }
                plan
            })
            .collect();

        Self::new(plans)
    }
}

/// Parse a `plan=price_id` comma-separated list (the `STRIPE_PRICE_IDS` format).
///
/// # Errors
///
/// Returns a configuration error for entries without `=` or with empty sides.
pub fn parse_price_id_overrides(raw: &str) -> Result<HashMap<String, String>, BillingError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (plan, price) = entry.split_once('=').ok_or_else(|| {
                BillingError::Configuration(format!("expected plan=price_id, got {entry}"))
            })?;
            let (plan, price) = (plan.trim(), price.trim());
            if plan.is_empty() || price.is_empty() {
                return Err(BillingError::Configuration(format!(
                    "expected plan=price_id, got {entry}"
                )));
            }
            Ok((plan.to_string(), price.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_credits() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.get("standard").unwrap().credits_in_usd_cents, 2500);
        assert_eq!(catalog.get("pro").unwrap().credits_in_usd_cents, 6000);
        assert!(catalog.get("enterprise").is_none());
    }

    #[test]
    fn find_by_price_id() {
        let catalog = PlanCatalog::default();
        let plan = catalog.find_by_price_id("price_pro_monthly").unwrap();
        assert_eq!(plan.id, "pro");
        assert!(catalog.find_by_price_id("price_unknown").is_none());
    }

    #[test]
    fn price_id_overrides_apply() {
        let overrides = parse_price_id_overrides("standard=price_1AbC, pro = price_2XyZ").unwrap();
        let catalog = PlanCatalog::default().with_price_ids(&overrides).unwrap();
        assert_eq!(catalog.get("standard").unwrap().price_id, "price_1AbC");
        assert_eq!(catalog.find_by_price_id("price_2XyZ").unwrap().id, "pro");
    }

    #[test]
    fn price_id_override_for_unknown_plan_fails() {
        let overrides = parse_price_id_overrides("gold=price_1").unwrap();
        let err = PlanCatalog::default().with_price_ids(&overrides).unwrap_err();
        assert!(matches!(err, BillingError::UnknownPlan(id) if id == "gold"));
    }

    #[test]
    fn duplicate_price_ids_rejected() {
        let overrides = parse_price_id_overrides("standard=price_same,pro=price_same").unwrap();
        assert!(PlanCatalog::default().with_price_ids(&overrides).is_err());
    }

    #[test]
    fn malformed_overrides_rejected() {
        assert!(parse_price_id_overrides("standard").is_err());
        assert!(parse_price_id_overrides("standard=").is_err());
        assert!(parse_price_id_overrides("").unwrap().is_empty());
    }
}

//! Stripe API types.
//!
//! Only the fields the ledger reads are modelled; everything else in Stripe's
//! payloads is ignored on deserialization.

use std::collections::HashMap;

use serde::Deserialize;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Customer name.
    #[serde(default)]
    pub name: Option<String>,
    /// Cash balance in cents. Negative means credit available.
    #[serde(default)]
    pub balance: i64,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Set on the stub Stripe returns for deleted customers.
    #[serde(default)]
    pub deleted: bool,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Stripe customer balance transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerBalanceTransaction {
    /// Transaction ID (`cbtxn_...`).
    pub id: String,
    /// Signed amount in cents.
    pub amount: i64,
    /// Customer the transaction belongs to.
    pub customer: String,
    /// Balance after the transaction.
    pub ending_balance: i64,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Created timestamp (Unix).
    pub created: i64,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// `payment` or `subscription`.
    #[serde(default)]
    pub mode: Option<String>,
    /// Payment status (`paid`, `unpaid`, `no_payment_required`).
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Total amount in cents.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Subscription created by the session, in subscription mode.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe price reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice ID (`in_...`).
    pub id: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Billing reason (`subscription_create`, `subscription_cycle`, ...).
    #[serde(default)]
    pub billing_reason: Option<String>,
    /// Amount paid in cents.
    #[serde(default)]
    pub amount_paid: i64,
    /// Line items.
    #[serde(default)]
    pub lines: Option<StripeList<InvoiceLine>>,
}

impl Invoice {
    /// Price id of the first line that carries one.
    #[must_use]
    pub fn first_price_id(&self) -> Option<&str> {
        self.lines
            .as_ref()?
            .data
            .iter()
            .find_map(InvoiceLine::price_id)
    }
}

/// Invoice line item.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLine {
    /// Legacy location of the price.
    #[serde(default)]
    pub price: Option<Price>,
    /// Location of the price on newer API versions.
    #[serde(default)]
    pub pricing: Option<InvoiceLinePricing>,
}

impl InvoiceLine {
    /// The line's price id, regardless of API version.
    #[must_use]
    pub fn price_id(&self) -> Option<&str> {
        self.price.as_ref().map(|p| p.id.as_str()).or_else(|| {
            self.pricing
                .as_ref()?
                .price_details
                .as_ref()
                .map(|d| d.price.as_str())
        })
    }
}

/// Invoice line pricing block.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLinePricing {
    /// Price details, when the line is priced by a Stripe price.
    #[serde(default)]
    pub price_details: Option<InvoiceLinePriceDetails>,
}

/// Invoice line price details.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLinePriceDetails {
    /// Price ID.
    pub price: String,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Customer ID.
    pub customer: String,
    /// Status (`active`, `past_due`, `canceled`, ...).
    pub status: String,
    /// Subscription items.
    #[serde(default)]
    pub items: Option<StripeList<SubscriptionItem>>,
}

impl Subscription {
    /// Price id of the first subscription item.
    #[must_use]
    pub fn first_price_id(&self) -> Option<&str> {
        self.items
            .as_ref()?
            .data
            .first()
            .map(|item| item.price.id.as_str())
    }
}

/// Subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// Price subscribed to.
    pub price: Price,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

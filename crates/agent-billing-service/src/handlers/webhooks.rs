//! Stripe webhook handler.
//!
//! Deliveries are verified against the signing secret, then dispatched by
//! event type. Every ledger write is keyed on a Stripe object id (checkout
//! session or invoice), so Stripe's at-least-once retries are safe. Errors
//! that a retry could fix are returned as 5xx; malformed objects are logged
//! and acknowledged.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use agent_billing_core::{CustomerId, UserId};

use crate::error::ApiError;
use crate::ledger::{CreditLedger, LedgerError};
use crate::provider::ProviderError;
use crate::state::AppState;
use crate::stripe::{
    signature, CheckoutSession, Invoice, Subscription, WebhookEvent, CREDITS_METADATA_KEY,
};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state.config.stripe_webhook_secret.as_deref().ok_or_else(|| {
        tracing::error!("Stripe webhook received but no webhook secret is configured");
        ApiError::Unavailable("Stripe webhooks are not configured".into())
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    signature::verify(
        &body,
        signature,
        secret,
        state.config.webhook_tolerance_seconds,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Invalid Stripe webhook signature");
        ApiError::BadRequest("Invalid webhook signature".into())
    })?;

    let event: WebhookEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    let ledger = state
        .ledger
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Billing backend not configured".into()))?;

    dispatch(ledger, &event).await.map_err(|e| {
        tracing::error!(
            event_type = %event.event_type,
            event_id = %event.id,
            error = %e,
            "Failed to process Stripe webhook"
        );
        retryable(e)
    })?;

    Ok(Json(WebhookResponse { received: true }))
}

async fn dispatch(ledger: &CreditLedger, event: &WebhookEvent) -> Result<(), LedgerError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            if let Some(session) = parse_object::<CheckoutSession>(event) {
                handle_checkout_completed(ledger, &session).await?;
            }
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            if let Some(invoice) = parse_object::<Invoice>(event) {
                handle_invoice_paid(ledger, &invoice).await?;
            }
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            if let Some(subscription) = parse_object::<Subscription>(event) {
                handle_subscription_update(ledger, &subscription, false).await?;
            }
        }
        "customer.subscription.deleted" => {
            if let Some(subscription) = parse_object::<Subscription>(event) {
                handle_subscription_update(ledger, &subscription, true).await?;
            }
        }
        "invoice.payment_failed" => {
            let invoice_id = event.data.object.get("id").and_then(|v| v.as_str());
            let customer = event.data.object.get("customer").and_then(|v| v.as_str());
            tracing::warn!(
                invoice_id = ?invoice_id,
                customer_id = ?customer,
                "Invoice payment failed - user may need to update payment method"
            );
        }
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
        }
    }

    Ok(())
}

/// Deserialize the event object, logging and skipping malformed payloads.
fn parse_object<T: serde::de::DeserializeOwned>(event: &WebhookEvent) -> Option<T> {
    match serde_json::from_value(event.data.object.clone()) {
        Ok(object) => Some(object),
        Err(e) => {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "Malformed Stripe event object, acknowledging without processing"
            );
            None
        }
    }
}

async fn handle_checkout_completed(
    ledger: &CreditLedger,
    session: &CheckoutSession,
) -> Result<(), LedgerError> {
    match session.mode.as_deref() {
        Some("payment") => {}
        Some("subscription") => {
            // Subscription credits arrive with the first paid invoice.
            tracing::info!(
                session_id = %session.id,
                subscription = ?session.subscription,
                "Subscription checkout completed"
            );
            return Ok(());
        }
        other => {
            tracing::debug!(session_id = %session.id, mode = ?other, "Ignoring checkout mode");
            return Ok(());
        }
    }

    if session.payment_status.as_deref() != Some("paid") {
        tracing::info!(
            session_id = %session.id,
            payment_status = ?session.payment_status,
            "Checkout session not paid yet, skipping"
        );
        return Ok(());
    }

    let credits = session
        .metadata
        .get(CREDITS_METADATA_KEY)
        .and_then(|s| s.parse::<i64>().ok())
        .or(session.amount_total)
        .unwrap_or(0);
    if credits <= 0 {
        tracing::warn!(session_id = %session.id, "Paid checkout carries no credit amount");
        return Ok(());
    }

    let Some(customer_id) = resolve_session_customer(ledger, session).await? else {
        tracing::warn!(
            session_id = %session.id,
            "Paid checkout has neither a customer nor a user reference"
        );
        return Ok(());
    };

    tracing::info!(
        session_id = %session.id,
        customer_id = %customer_id,
        credits = credits,
        "Processing credit purchase"
    );

    ledger
        .grant_purchased_credits(&customer_id, &session.id, credits)
        .await?;
    Ok(())
}

async fn resolve_session_customer(
    ledger: &CreditLedger,
    session: &CheckoutSession,
) -> Result<Option<CustomerId>, LedgerError> {
    if let Some(id) = session.customer.as_deref().and_then(|c| c.parse().ok()) {
        return Ok(Some(id));
    }

    match session
        .client_reference_id
        .as_deref()
        .and_then(|u| u.parse::<UserId>().ok())
    {
        Some(user_id) => Ok(Some(
            ledger.get_or_create_customer(&user_id, None).await?.id,
        )),
        None => Ok(None),
    }
}

async fn handle_invoice_paid(ledger: &CreditLedger, invoice: &Invoice) -> Result<(), LedgerError> {
    let Some(customer_id) = invoice
        .customer
        .as_deref()
        .and_then(|c| c.parse::<CustomerId>().ok())
    else {
        tracing::warn!(invoice_id = %invoice.id, "Paid invoice has no customer");
        return Ok(());
    };

    let Some(price_id) = invoice.first_price_id() else {
        tracing::info!(invoice_id = %invoice.id, "Paid invoice has no priced line, skipping");
        return Ok(());
    };

    let Some(plan) = ledger.catalog().find_by_price_id(price_id) else {
        tracing::warn!(
            invoice_id = %invoice.id,
            price_id = %price_id,
            "Paid invoice for unknown price, no credits granted"
        );
        return Ok(());
    };

    tracing::info!(
        invoice_id = %invoice.id,
        customer_id = %customer_id,
        plan_id = %plan.id,
        billing_reason = ?invoice.billing_reason,
        "Processing subscription invoice"
    );

    ledger
        .grant_monthly_credits(&customer_id, &invoice.id, plan)
        .await?;
    Ok(())
}

async fn handle_subscription_update(
    ledger: &CreditLedger,
    subscription: &Subscription,
    deleted: bool,
) -> Result<(), LedgerError> {
    let Ok(customer_id) = subscription.customer.parse::<CustomerId>() else {
        tracing::warn!(
            subscription_id = %subscription.id,
            customer = %subscription.customer,
            "Subscription references an invalid customer"
        );
        return Ok(());
    };

    let plan_id = if deleted {
        None
    } else {
        subscription
            .first_price_id()
            .and_then(|price| ledger.catalog().find_by_price_id(price))
            .map(|plan| plan.id.clone())
    };

    tracing::info!(
        subscription_id = %subscription.id,
        status = %subscription.status,
        plan_id = ?plan_id,
        "Subscription changed"
    );

    ledger
        .record_subscription(&customer_id, plan_id.as_deref(), &subscription.status)
        .await?;
    Ok(())
}

/// Every processing failure is a server error so that Stripe retries.
fn retryable(err: LedgerError) -> ApiError {
    match err {
        LedgerError::Provider(ProviderError::Unavailable(msg)) => ApiError::Unavailable(msg),
        other => ApiError::Internal(other.to_string()),
    }
}

/// Stripe webhook receiver
///
/// ```text
/// POST /api/stripe/webhook
/// Stripe-Signature: t=1700000000,v1=5257a869...
///
/// {"id": "evt_...", "type": "customer.subscription.updated", "data": {"object": {...}}}
/// ```
///
/// # Responses
///
/// - `200 {"received": true}`: Event applied or acknowledged
/// - `200 {"received": true, "duplicate": true}`: Event ID already processed
/// - `400`: Missing or invalid signature, malformed event
/// - `500`: Handler failed; the claim was released so Stripe's retry is processed
/// - `503`: No webhook secret configured
///
/// The handler reads the raw body because the signature covers the exact bytes.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use mealplan_shared::billing::{event::StripeEvent, reconcile::WebhookOutcome};
use serde::Serialize;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let verifier = state.webhook_verifier()?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    if let Err(e) = verifier.verify(&body, signature) {
        tracing::warn!(error = %e, "Rejected webhook with invalid signature");
        return Err(e.into());
    }

    let event = StripeEvent::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {}", e)))?;

    tracing::debug!(
        event_id = %event.id,
        event_type = %event.event_type,
        livemode = event.livemode,
        "Received Stripe webhook"
    );

    let outcome = state.webhooks.process(&event).await?;

    Ok(Json(WebhookAck {
        received: true,
        duplicate: outcome == WebhookOutcome::Duplicate,
    }))
}

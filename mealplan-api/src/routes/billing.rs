/// Subscription endpoints
///
/// - `GET  /api/stripe/subscription` - Current plan of the caller
/// - `POST /api/stripe/checkout` - Start a Stripe Checkout for the premium plan
/// - `POST /api/stripe/portal` - Open the Stripe Billing Portal
///
/// The subscription row itself is only written by the webhook; these
/// endpoints read it and hand the browser a Stripe-hosted URL.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::identity::UserIdentity,
};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use mealplan_shared::{
    billing::client::CheckoutRequest,
    models::subscription::{Subscription, SubscriptionStatus},
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionResponse {
    pub status: SubscriptionStatus,
    pub is_premium: bool,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl From<Option<&Subscription>> for SubscriptionResponse {
    fn from(row: Option<&Subscription>) -> Self {
        match row {
            Some(sub) => Self {
                status: sub.status(),
                is_premium: sub.is_premium(),
                current_period_end: sub.current_period_end,
                cancel_at_period_end: sub.cancel_at_period_end,
            },
            None => Self {
                status: SubscriptionStatus::Inactive,
                is_premium: false,
                current_period_end: None,
                cancel_at_period_end: false,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Stripe-hosted payment page
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

pub async fn get_subscription(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> ApiResult<Json<SubscriptionResponse>> {
    let row = Subscription::find_by_user(&state.db, identity.user_id).await?;
    Ok(Json(SubscriptionResponse::from(row.as_ref())))
}

/// Create a Checkout Session for the configured price
///
/// # Errors
///
/// - `409 Conflict`: Already on an active or trialing plan
/// - `502 Bad Gateway`: Stripe rejected the request
/// - `503 Service Unavailable`: Stripe not configured
pub async fn create_checkout(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> ApiResult<Json<CheckoutResponse>> {
    let stripe = state.stripe()?;
    let stripe_config = state
        .config
        .stripe
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("Stripe"))?;

    let existing = Subscription::find_by_user(&state.db, identity.user_id).await?;
    if existing.as_ref().is_some_and(Subscription::is_premium) {
        return Err(ApiError::Conflict("You already have an active subscription".to_string()));
    }

    let base = &state.config.api.app_base_url;
    let request = CheckoutRequest {
        user_id: identity.user_id,
        price_id: stripe_config.price_id.clone(),
        success_url: format!("{}/account?checkout=success&session_id={{CHECKOUT_SESSION_ID}}", base),
        cancel_url: format!("{}/pricing?checkout=cancelled", base),
        customer_id: existing.and_then(|s| s.stripe_customer_id),
        customer_email: identity.email.clone(),
    };

    let session = stripe.create_checkout_session(&request).await?;

    Ok(Json(CheckoutResponse {
        url: session.url,
        session_id: session.id,
    }))
}

/// Open the Billing Portal for the caller's Stripe customer
///
/// # Errors
///
/// - `404 Not Found`: The caller never completed a checkout
pub async fn create_portal(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> ApiResult<Json<PortalResponse>> {
    let stripe = state.stripe()?;

    let customer_id = Subscription::find_by_user(&state.db, identity.user_id)
        .await?
        .and_then(|s| s.stripe_customer_id)
        .ok_or_else(|| ApiError::NotFound("No billing account found".to_string()))?;

    let return_url = format!("{}/account", state.config.api.app_base_url);
    let session = stripe.create_portal_session(&customer_id, &return_url).await?;

    Ok(Json(PortalResponse { url: session.url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_response_without_row_is_inactive() {
        let response = SubscriptionResponse::from(None);
        assert_eq!(response.status, SubscriptionStatus::Inactive);
        assert!(!response.is_premium);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "inactive");
    }

    #[test]
    fn test_response_from_trialing_row() {
        let row = Subscription {
            user_id: Uuid::new_v4(),
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: Some("sub_1".to_string()),
            status: "trialing".to_string(),
            price_id: Some("price_1".to_string()),
            current_period_end: None,
            cancel_at_period_end: true,
            updated_at: Utc::now(),
        };

        let response = SubscriptionResponse::from(Some(&row));
        assert_eq!(response.status, SubscriptionStatus::Trialing);
        assert!(response.is_premium);
        assert!(response.cancel_at_period_end);
    }
}

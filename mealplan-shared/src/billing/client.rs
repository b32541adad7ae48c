/// Stripe REST client
///
/// Covers the two calls the application makes: creating a subscription
/// Checkout Session and a Billing Portal session. Requests are
/// form-encoded as the Stripe API expects.

use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::event::USER_ID_METADATA_KEY;
use crate::http::{build_client, ensure_success, ClientError};

const SERVICE: &str = "stripe";

/// Default Stripe API base URL
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Parameters of a subscription checkout
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,

    /// Existing Stripe customer to reuse
    pub customer_id: Option<String>,

    /// Pre-fills the email when no customer exists yet
    pub customer_email: Option<String>,
}

impl CheckoutRequest {
    fn form(&self) -> Vec<(String, String)> {
        let user_id = self.user_id.to_string();
        let mut form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), self.price_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("client_reference_id".to_string(), user_id.clone()),
            (format!("metadata[{}]", USER_ID_METADATA_KEY), user_id.clone()),
            (
                format!("subscription_data[metadata][{}]", USER_ID_METADATA_KEY),
                user_id,
            ),
            ("allow_promotion_codes".to_string(), "true".to_string()),
        ];

        match (&self.customer_id, &self.customer_email) {
            (Some(customer), _) => form.push(("customer".to_string(), customer.clone())),
            (None, Some(email)) => form.push(("customer_email".to_string(), email.clone())),
            (None, None) => {}
        }

        form
    }
}

/// Created Checkout Session
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionCreated {
    pub id: String,

    /// Hosted payment page
    pub url: String,
}

/// Created Billing Portal session
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Stripe API client authenticated with a secret key
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_client()?,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates a subscription Checkout Session
    ///
    /// The user ID travels as `client_reference_id` and in the session and
    /// subscription metadata so every later webhook can be tied back to it.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSessionCreated, ClientError> {
        debug!(user_id = %request.user_id, "Creating Stripe checkout session");

        let session: CheckoutSessionCreated =
            self.post_form("/v1/checkout/sessions", &request.form()).await?;

        info!(user_id = %request.user_id, session_id = %session.id, "Stripe checkout session created");
        Ok(session)
    }

    /// Creates a Billing Portal session for an existing customer
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, ClientError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];

        self.post_form("/v1/billing_portal/sessions", &form).await
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| ClientError::network(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;

        response.json::<T>().await.map_err(|e| ClientError::Parse {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

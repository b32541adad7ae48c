/// Stripe event envelope and the payloads this service reconciles
///
/// Only the fields needed to update a subscription row are modelled. Both the
/// classic and the newer Stripe API shapes are accepted where they differ
/// (period end on the subscription vs. on its items, invoice subscription at
/// the top level vs. under `parent.subscription_details`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata key carrying the application user ID on Stripe objects
pub const USER_ID_METADATA_KEY: &str = "user_id";

/// Event payload could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid event JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid {event_type} payload: {message}")]
    InvalidObject { event_type: String, message: String },
}

/// Stripe event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    /// Event ID (`evt_...`), the idempotency key
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Creation time (Unix seconds)
    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub livemode: bool,

    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// An ID field Stripe may return either as a string or as an expanded object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

/// `checkout.session` object
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,

    /// `subscription`, `payment` or `setup`
    #[serde(default)]
    pub mode: Option<String>,

    /// Set to the application user ID when the session is created
    #[serde(default)]
    pub client_reference_id: Option<String>,

    #[serde(default)]
    pub customer: Option<Expandable>,

    #[serde(default)]
    pub subscription: Option<Expandable>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Application user who started the checkout
    pub fn user_id(&self) -> Option<Uuid> {
        self.client_reference_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .or_else(|| user_id_from_metadata(&self.metadata))
    }

    pub fn is_subscription(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }
}

/// `subscription` object
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,

    pub customer: Expandable,

    pub status: String,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub items: ListOf<SubscriptionItem>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub price: Option<Price>,

    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
}

/// Stripe list wrapper (`{"data": [...]}`)
#[derive(Debug, Clone, Deserialize)]
pub struct ListOf<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for ListOf<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl StripeSubscription {
    pub fn customer_id(&self) -> &str {
        self.customer.id()
    }

    /// Price of the first item
    pub fn price_id(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }

    /// End of the paid period, from the subscription or its first item
    pub fn current_period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .or_else(|| self.items.data.first().and_then(|i| i.current_period_end))
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    pub fn user_id(&self) -> Option<Uuid> {
        user_id_from_metadata(&self.metadata)
    }
}

/// `invoice` object
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,

    #[serde(default)]
    pub customer: Option<Expandable>,

    #[serde(default)]
    pub subscription: Option<Expandable>,

    #[serde(default)]
    pub subscription_details: Option<SubscriptionDetails>,

    #[serde(default)]
    pub parent: Option<InvoiceParent>,

    #[serde(default)]
    pub lines: ListOf<InvoiceLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceParent {
    #[serde(default)]
    pub subscription_details: Option<SubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionDetails {
    #[serde(default)]
    pub subscription: Option<Expandable>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLine {
    #[serde(default)]
    pub period: Option<Period>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Period {
    pub end: i64,
}

impl Invoice {
    fn details(&self) -> Option<&SubscriptionDetails> {
        self.parent
            .as_ref()
            .and_then(|p| p.subscription_details.as_ref())
            .or(self.subscription_details.as_ref())
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(Expandable::id)
    }

    /// Subscription the invoice bills; `None` for one-off invoices
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription
            .as_ref()
            .or_else(|| self.details().and_then(|d| d.subscription.as_ref()))
            .map(Expandable::id)
    }

    /// End of the period covered by the first line
    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.lines
            .data
            .first()
            .and_then(|line| line.period.as_ref())
            .and_then(|period| DateTime::<Utc>::from_timestamp(period.end, 0))
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.details().and_then(|d| user_id_from_metadata(&d.metadata))
    }
}

fn user_id_from_metadata(metadata: &HashMap<String, String>) -> Option<Uuid> {
    metadata
        .get(USER_ID_METADATA_KEY)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Events this service reacts to
#[derive(Debug, Clone)]
pub enum BillingEvent {
    /// `checkout.session.completed`
    CheckoutCompleted(CheckoutSession),

    /// `customer.subscription.created` / `customer.subscription.updated`
    SubscriptionChanged(StripeSubscription),

    /// `customer.subscription.deleted`
    SubscriptionDeleted(StripeSubscription),

    /// `invoice.payment_succeeded` / `invoice.paid`
    InvoicePaid(Invoice),

    /// `invoice.payment_failed`
    InvoicePaymentFailed(Invoice),

    /// Anything else (e.g. `charge.succeeded`); acknowledged without changes
    Other(String),
}

impl StripeEvent {
    /// Parses an event envelope from the raw webhook body
    pub fn from_slice(body: &[u8]) -> Result<Self, EventError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Decodes `data.object` according to the event type
    pub fn billing_event(&self) -> Result<BillingEvent, EventError> {
        Ok(match self.event_type.as_str() {
            "checkout.session.completed" => BillingEvent::CheckoutCompleted(self.object()?),
            "customer.subscription.created" | "customer.subscription.updated" => {
                BillingEvent::SubscriptionChanged(self.object()?)
            }
            "customer.subscription.deleted" => BillingEvent::SubscriptionDeleted(self.object()?),
            "invoice.payment_succeeded" | "invoice.paid" => BillingEvent::InvoicePaid(self.object()?),
            "invoice.payment_failed" => BillingEvent::InvoicePaymentFailed(self.object()?),
            other => BillingEvent::Other(other.to_string()),
        })
    }

    fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| EventError::InvalidObject {
            event_type: self.event_type.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_test",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_checkout_session_user_id_sources() {
        let user = Uuid::new_v4();
        let from_reference = event(
            "checkout.session.completed",
            json!({ "id": "cs_1", "mode": "subscription", "client_reference_id": user.to_string() }),
        );
        let from_metadata = event(
            "checkout.session.completed",
            json!({ "id": "cs_2", "client_reference_id": "not-a-uuid", "metadata": { "user_id": user.to_string() } }),
        );

        for e in [from_reference, from_metadata] {
            match e.billing_event().unwrap() {
                BillingEvent::CheckoutCompleted(session) => assert_eq!(session.user_id(), Some(user)),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_subscription_fields_with_expanded_customer() {
        let e = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "customer": { "id": "cus_1", "object": "customer" },
                "status": "past_due",
                "cancel_at_period_end": true,
                "items": { "data": [ { "price": { "id": "price_1" }, "current_period_end": 1_700_086_400 } ] }
            }),
        );

        let BillingEvent::SubscriptionChanged(sub) = e.billing_event().unwrap() else {
            panic!("expected subscription event");
        };

        assert_eq!(sub.customer_id(), "cus_1");
        assert_eq!(sub.price_id(), Some("price_1"));
        assert_eq!(sub.current_period_end().unwrap().timestamp(), 1_700_086_400);
        assert!(sub.cancel_at_period_end);
    }

    #[test]
    fn test_invoice_subscription_in_parent_details() {
        let user = Uuid::new_v4();
        let e = event(
            "invoice.paid",
            json!({
                "id": "in_1",
                "customer": "cus_1",
                "parent": { "subscription_details": {
                    "subscription": "sub_1",
                    "metadata": { "user_id": user.to_string() }
                } },
                "lines": { "data": [ { "period": { "start": 1, "end": 1_702_000_000 } } ] }
            }),
        );

        let BillingEvent::InvoicePaid(invoice) = e.billing_event().unwrap() else {
            panic!("expected invoice event");
        };

        assert_eq!(invoice.customer_id(), Some("cus_1"));
        assert_eq!(invoice.subscription_id(), Some("sub_1"));
        assert_eq!(invoice.user_id(), Some(user));
        assert_eq!(invoice.period_end().unwrap().timestamp(), 1_702_000_000);
    }

    #[test]
    fn test_unhandled_type_is_other() {
        let e = event("charge.succeeded", json!({ "id": "ch_1" }));
        assert!(matches!(e.billing_event().unwrap(), BillingEvent::Other(t) if t == "charge.succeeded"));
    }

    #[test]
    fn test_invalid_object_reports_event_type() {
        let e = event("customer.subscription.deleted", json!({ "id": "sub_1" }));
        let err = e.billing_event().unwrap_err();
        assert!(err.to_string().contains("customer.subscription.deleted"));
    }

    #[test]
    fn test_envelope_requires_id() {
        assert!(StripeEvent::from_slice(br#"{"type":"invoice.paid","data":{"object":{}}}"#).is_err());
        assert!(StripeEvent::from_slice(b"not json").is_err());
    }
}

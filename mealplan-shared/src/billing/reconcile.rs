/// Webhook reconciliation
///
/// [`WebhookProcessor::process`] claims the event in the ledger, dispatches it
/// to one of five handlers and releases the claim if the handler fails, so the
/// caller can answer 500 and let Stripe redeliver.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::event::{BillingEvent, CheckoutSession, EventError, Invoice, StripeEvent, StripeSubscription};
use super::ledger::EventLedger;
use super::store::SubscriptionStore;
use crate::models::subscription::{SubscriptionChange, SubscriptionStatus};

/// Reconciliation failure
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Event payload could not be decoded; nothing was claimed
    #[error(transparent)]
    Payload(#[from] EventError),

    /// Ledger or subscription table unavailable
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// No row references the customer and the event names no user.
    /// Typically the checkout event has not arrived yet.
    #[error("No subscription owner known for customer {0}")]
    UnknownCustomer(String),
}

/// What happened to a delivered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A subscription row was written
    Applied,

    /// Event acknowledged without changes
    Ignored,

    /// Event ID was already processed
    Duplicate,
}

/// Dispatches verified Stripe events onto the subscription table
#[derive(Clone)]
pub struct WebhookProcessor {
    ledger: Arc<dyn EventLedger>,
    store: Arc<dyn SubscriptionStore>,
}

impl WebhookProcessor {
    pub fn new(ledger: Arc<dyn EventLedger>, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { ledger, store }
    }

    /// The idempotency ledger, for TTL maintenance
    pub fn ledger(&self) -> &Arc<dyn EventLedger> {
        &self.ledger
    }

    /// Processes one event at most once per ledger retention window
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::Payload`]: the event object is malformed (not claimed)
    /// - [`ReconcileError::Storage`] / [`ReconcileError::UnknownCustomer`]:
    ///   handler failed, claim released
    pub async fn process(&self, event: &StripeEvent) -> Result<WebhookOutcome, ReconcileError> {
        let billing_event = event.billing_event()?;

        if !self.ledger.claim(&event.id, &event.event_type).await? {
            info!(event_id = %event.id, event_type = %event.event_type, "Duplicate webhook event skipped");
            return Ok(WebhookOutcome::Duplicate);
        }

        match self.dispatch(billing_event).await {
            Ok(outcome) => {
                info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    outcome = ?outcome,
                    "Webhook event processed"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(event_id = %event.id, event_type = %event.event_type, error = %err, "Webhook handler failed");
                if let Err(release_err) = self.ledger.release(&event.id).await {
                    error!(event_id = %event.id, error = %release_err, "Failed to release webhook claim");
                }
                Err(err)
            }
        }
    }

    async fn dispatch(&self, event: BillingEvent) -> Result<WebhookOutcome, ReconcileError> {
        match event {
            BillingEvent::CheckoutCompleted(session) => self.checkout_completed(session).await,
            BillingEvent::SubscriptionChanged(sub) => self.subscription_changed(sub).await,
            BillingEvent::SubscriptionDeleted(sub) => self.subscription_deleted(sub).await,
            BillingEvent::InvoicePaid(invoice) => {
                self.invoice_settled(invoice, SubscriptionStatus::Active).await
            }
            BillingEvent::InvoicePaymentFailed(invoice) => {
                self.invoice_settled(invoice, SubscriptionStatus::PastDue).await
            }
            BillingEvent::Other(event_type) => {
                debug!(event_type = %event_type, "Unhandled webhook event type acknowledged");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn checkout_completed(
        &self,
        session: CheckoutSession,
    ) -> Result<WebhookOutcome, ReconcileError> {
        if !session.is_subscription() {
            debug!(session_id = %session.id, mode = ?session.mode, "Non-subscription checkout ignored");
            return Ok(WebhookOutcome::Ignored);
        }

        let Some(user_id) = session.user_id() else {
            warn!(session_id = %session.id, "Checkout session carries no user id");
            return Ok(WebhookOutcome::Ignored);
        };

        let change = SubscriptionChange {
            stripe_customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
            stripe_subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
            ..SubscriptionChange::status(SubscriptionStatus::Active)
        };

        // stripe_customer_id is unique; a customer stays linked to its first user
        if let Some(customer_id) = change.stripe_customer_id.as_deref() {
            if let Some(owner) = self.store.customer_owner(customer_id).await? {
                if owner != user_id {
                    warn!(
                        session_id = %session.id,
                        customer_id,
                        owner = %owner,
                        user_id = %user_id,
                        "Checkout customer already linked to another user; acknowledged without changes"
                    );
                    return Ok(WebhookOutcome::Ignored);
                }
            }
        }

        match self.store.upsert_for_user(user_id, &change).await {
            Ok(_) => Ok(WebhookOutcome::Applied),
            Err(e) if is_unique_violation(&e) => {
                warn!(
                    session_id = %session.id,
                    user_id = %user_id,
                    "Checkout customer linked to another user concurrently; acknowledged without changes"
                );
                Ok(WebhookOutcome::Ignored)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn subscription_changed(
        &self,
        sub: StripeSubscription,
    ) -> Result<WebhookOutcome, ReconcileError> {
        let change = SubscriptionChange {
            status: SubscriptionStatus::from_stripe(&sub.status),
            stripe_customer_id: Some(sub.customer_id().to_string()),
            stripe_subscription_id: Some(sub.id.clone()),
            price_id: sub.price_id().map(str::to_string),
            current_period_end: sub.current_period_end(),
            cancel_at_period_end: Some(sub.cancel_at_period_end),
        };

        self.apply_for_customer(sub.customer_id(), sub.user_id(), &change)
            .await?
            .ok_or_else(|| ReconcileError::UnknownCustomer(sub.customer_id().to_string()))
    }

    async fn subscription_deleted(
        &self,
        sub: StripeSubscription,
    ) -> Result<WebhookOutcome, ReconcileError> {
        let change = SubscriptionChange {
            stripe_customer_id: Some(sub.customer_id().to_string()),
            cancel_at_period_end: Some(false),
            ..SubscriptionChange::status(SubscriptionStatus::Canceled)
        };

        match self
            .apply_for_customer(sub.customer_id(), sub.user_id(), &change)
            .await?
        {
            Some(outcome) => Ok(outcome),
            None => {
                warn!(customer_id = %sub.customer_id(), "Deleted subscription for unknown customer");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn invoice_settled(
        &self,
        invoice: Invoice,
        status: SubscriptionStatus,
    ) -> Result<WebhookOutcome, ReconcileError> {
        let (Some(customer_id), Some(subscription_id)) =
            (invoice.customer_id(), invoice.subscription_id())
        else {
            debug!(invoice_id = %invoice.id, "Invoice without subscription ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        let change = SubscriptionChange {
            stripe_customer_id: Some(customer_id.to_string()),
            stripe_subscription_id: Some(subscription_id.to_string()),
            current_period_end: if status == SubscriptionStatus::Active {
                invoice.period_end()
            } else {
                None
            },
            ..SubscriptionChange::status(status)
        };

        self.apply_for_customer(customer_id, invoice.user_id(), &change)
            .await?
            .ok_or_else(|| ReconcileError::UnknownCustomer(customer_id.to_string()))
    }

    /// Updates the row of `customer_id`, falling back to the user named in metadata
    ///
    /// Returns `None` when neither identifies a row.
    async fn apply_for_customer(
        &self,
        customer_id: &str,
        user_id: Option<Uuid>,
        change: &SubscriptionChange,
    ) -> Result<Option<WebhookOutcome>, ReconcileError> {
        if self.store.update_by_customer(customer_id, change).await?.is_some() {
            return Ok(Some(WebhookOutcome::Applied));
        }

        match user_id {
            Some(user_id) => {
                self.store.upsert_for_user(user_id, change).await?;
                Ok(Some(WebhookOutcome::Applied))
            }
            None => Ok(None),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

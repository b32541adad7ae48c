/// Stripe billing
///
/// Subscription state is reconciled from Stripe webhooks:
///
/// ```text
/// raw body + Stripe-Signature
///        │
///        ▼
///  signature::WebhookVerifier ──► 400 on mismatch / stale timestamp
///        │
///        ▼
///  event::StripeEvent ──► event::BillingEvent
///        │
///        ▼
///  reconcile::WebhookProcessor
///     ├── ledger::EventLedger        (claim event id, release on failure)
///     └── store::SubscriptionStore   (upsert one row of `subscriptions`)
/// ```
///
/// The ledger is durable (`processed_webhook_events`), so redeliveries are
/// detected across restarts and replicas; entries expire after the configured
/// retention.
///
/// - [`signature`]: `Stripe-Signature` verification
/// - [`event`]: Event envelope and typed payloads
/// - [`ledger`]: Idempotency ledger
/// - [`store`]: Subscription persistence seam
/// - [`reconcile`]: Event dispatch
/// - [`client`]: Stripe REST client for Checkout and the Billing Portal

pub mod client;
pub mod event;
pub mod ledger;
pub mod reconcile;
pub mod signature;
pub mod store;

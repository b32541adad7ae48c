/// Subscription state per user
///
/// Written exclusively by Stripe webhook reconciliation; read by the API to
/// decide whether a user is premium and which Stripe customer to send to the
/// billing portal.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subscriptions (
///     user_id UUID PRIMARY KEY,
///     stripe_customer_id VARCHAR(255) UNIQUE,
///     stripe_subscription_id VARCHAR(255),
///     status VARCHAR(20) NOT NULL DEFAULT 'inactive',
///     price_id VARCHAR(255),
///     current_period_end TIMESTAMPTZ,
///     cancel_at_period_end BOOLEAN NOT NULL DEFAULT FALSE,
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed, or Stripe reported a status this service does not track
    Inactive,
    Incomplete,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
}

impl SubscriptionStatus {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
        }
    }

    /// Maps a Stripe subscription status
    ///
    /// `incomplete_expired` and `paused` collapse into `Inactive`.
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "incomplete" => SubscriptionStatus::Incomplete,
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            _ => SubscriptionStatus::Inactive,
        }
    }

    /// Whether the status grants premium features
    pub fn is_premium(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

/// Subscription row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub updated_at: DateTime<Utc>,
}

/// Fields a billing event may change; `None` keeps the stored value
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionChange {
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
}

impl SubscriptionChange {
    /// A change that only sets the status
    pub fn status(status: SubscriptionStatus) -> Self {
        Self {
            status,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            price_id: None,
            current_period_end: None,
            cancel_at_period_end: None,
        }
    }

    /// Applies the change to an existing row in memory
    pub fn apply_to(&self, row: &mut Subscription) {
        row.status = self.status.as_str().to_string();
        if let Some(customer) = &self.stripe_customer_id {
            row.stripe_customer_id = Some(customer.clone());
        }
        if let Some(subscription) = &self.stripe_subscription_id {
            row.stripe_subscription_id = Some(subscription.clone());
        }
        if let Some(price) = &self.price_id {
            row.price_id = Some(price.clone());
        }
        if let Some(end) = self.current_period_end {
            row.current_period_end = Some(end);
        }
        if let Some(cancel) = self.cancel_at_period_end {
            row.cancel_at_period_end = cancel;
        }
        row.updated_at = Utc::now();
    }
}

impl Subscription {
    /// Parsed status; unknown values read as `Inactive`
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_stripe(&self.status)
    }

    /// Whether the user currently has premium access
    pub fn is_premium(&self) -> bool {
        self.status().is_premium()
    }

    /// Finds the subscription of a user
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT user_id, stripe_customer_id, stripe_subscription_id, status, price_id,
                   current_period_end, cancel_at_period_end, updated_at
            FROM subscriptions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Finds the subscription owned by a Stripe customer
    pub async fn find_by_customer(
        pool: &PgPool,
        customer_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT user_id, stripe_customer_id, stripe_subscription_id, status, price_id,
                   current_period_end, cancel_at_period_end, updated_at
            FROM subscriptions
            WHERE stripe_customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(pool)
        .await
    }

    /// Inserts or updates the row keyed by user ID
    pub async fn upsert_for_user(
        pool: &PgPool,
        user_id: Uuid,
        change: &SubscriptionChange,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, stripe_customer_id, stripe_subscription_id,
                                       status, price_id, current_period_end, cancel_at_period_end)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, FALSE))
            ON CONFLICT (user_id) DO UPDATE SET
                stripe_customer_id = COALESCE(EXCLUDED.stripe_customer_id, subscriptions.stripe_customer_id),
                stripe_subscription_id = COALESCE(EXCLUDED.stripe_subscription_id, subscriptions.stripe_subscription_id),
                status = EXCLUDED.status,
                price_id = COALESCE(EXCLUDED.price_id, subscriptions.price_id),
                current_period_end = COALESCE(EXCLUDED.current_period_end, subscriptions.current_period_end),
                cancel_at_period_end = COALESCE($7, subscriptions.cancel_at_period_end),
                updated_at = NOW()
            RETURNING user_id, stripe_customer_id, stripe_subscription_id, status, price_id,
                      current_period_end, cancel_at_period_end, updated_at
            "#,
        )
        .bind(user_id)
        .bind(change.stripe_customer_id.as_deref())
        .bind(change.stripe_subscription_id.as_deref())
        .bind(change.status.as_str())
        .bind(change.price_id.as_deref())
        .bind(change.current_period_end)
        .bind(change.cancel_at_period_end)
        .fetch_one(pool)
        .await
    }

    /// Updates the row owned by a Stripe customer
    ///
    /// Returns `None` when no row references the customer.
    pub async fn update_by_customer(
        pool: &PgPool,
        customer_id: &str,
        change: &SubscriptionChange,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET
                stripe_subscription_id = COALESCE($2, stripe_subscription_id),
                status = $3,
                price_id = COALESCE($4, price_id),
                current_period_end = COALESCE($5, current_period_end),
                cancel_at_period_end = COALESCE($6, cancel_at_period_end),
                updated_at = NOW()
            WHERE stripe_customer_id = $1
            RETURNING user_id, stripe_customer_id, stripe_subscription_id, status, price_id,
                      current_period_end, cancel_at_period_end, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(change.stripe_subscription_id.as_deref())
        .bind(change.status.as_str())
        .bind(change.price_id.as_deref())
        .bind(change.current_period_end)
        .bind(change.cancel_at_period_end)
        .fetch_optional(pool)
        .await
    }
}

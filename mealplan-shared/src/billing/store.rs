/// Persistence seam for subscription reconciliation
///
/// [`PgSubscriptionStore`] writes the `subscriptions` table through the model;
/// [`MemorySubscriptionStore`] keeps rows in process for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::subscription::{Subscription, SubscriptionChange, SubscriptionStatus};

/// Writes subscription rows keyed by user ID or Stripe customer ID
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Inserts or updates the row of `user_id`
    async fn upsert_for_user(
        &self,
        user_id: Uuid,
        change: &SubscriptionChange,
    ) -> Result<Subscription, sqlx::Error>;

    /// Updates the row referencing `customer_id`; `None` when there is none
    async fn update_by_customer(
        &self,
        customer_id: &str,
        change: &SubscriptionChange,
    ) -> Result<Option<Subscription>, sqlx::Error>;

    /// User whose row references `customer_id`
    async fn customer_owner(&self, customer_id: &str) -> Result<Option<Uuid>, sqlx::Error>;
}

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn upsert_for_user(
        &self,
        user_id: Uuid,
        change: &SubscriptionChange,
    ) -> Result<Subscription, sqlx::Error> {
        Subscription::upsert_for_user(&self.pool, user_id, change).await
    }

    async fn update_by_customer(
        &self,
        customer_id: &str,
        change: &SubscriptionChange,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        Subscription::update_by_customer(&self.pool, customer_id, change).await
    }

    async fn customer_owner(&self, customer_id: &str) -> Result<Option<Uuid>, sqlx::Error> {
        Ok(Subscription::find_by_customer(&self.pool, customer_id)
            .await?
            .map(|row| row.user_id))
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    rows: Mutex<HashMap<Uuid, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current row of a user
    pub fn get(&self, user_id: Uuid) -> Option<Subscription> {
        self.lock().get(&user_id).cloned()
    }

    /// Seeds a row
    pub fn insert(&self, row: Subscription) {
        self.lock().insert(row.user_id, row);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Subscription>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn upsert_for_user(
        &self,
        user_id: Uuid,
        change: &SubscriptionChange,
    ) -> Result<Subscription, sqlx::Error> {
        let mut rows = self.lock();
        let row = rows.entry(user_id).or_insert_with(|| Subscription {
            user_id,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            status: SubscriptionStatus::Inactive.as_str().to_string(),
            price_id: None,
            current_period_end: None,
            cancel_at_period_end: false,
            updated_at: Utc::now(),
        });
        change.apply_to(row);
        Ok(row.clone())
    }

    async fn update_by_customer(
        &self,
        customer_id: &str,
        change: &SubscriptionChange,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let mut rows = self.lock();
        let row = rows
            .values_mut()
            .find(|row| row.stripe_customer_id.as_deref() == Some(customer_id));

        Ok(row.map(|row| {
            // The customer link itself never changes through this path
            let mut change = change.clone();
            change.stripe_customer_id = None;
            change.apply_to(row);
            row.clone()
        }))
    }

    async fn customer_owner(&self, customer_id: &str) -> Result<Option<Uuid>, sqlx::Error> {
        Ok(self
            .lock()
            .values()
            .find(|row| row.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|row| row.user_id))
    }
}

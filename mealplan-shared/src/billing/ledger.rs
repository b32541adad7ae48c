/// Idempotency ledger for webhook deliveries
///
/// Stripe delivers at least once. Before an event is reconciled its ID is
/// claimed in the ledger; a second claim of the same ID reports a duplicate.
/// If reconciliation fails the claim is released so Stripe's retry is
/// processed instead of being dropped as a duplicate.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE processed_webhook_events (
///     event_id VARCHAR(255) PRIMARY KEY,
///     event_type VARCHAR(100) NOT NULL,
///     processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Capacity of [`MemoryEventLedger::default`]
pub const DEFAULT_MEMORY_CAPACITY: usize = 1000;

/// Records which webhook events have been processed
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Claims `event_id`; returns `false` if it was already claimed
    async fn claim(&self, event_id: &str, event_type: &str) -> Result<bool, sqlx::Error>;

    /// Drops a claim so the event can be processed again
    async fn release(&self, event_id: &str) -> Result<(), sqlx::Error>;

    /// Forgets claims older than `cutoff`; returns how many were removed
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error>;
}

/// Durable ledger backed by `processed_webhook_events`
///
/// Shared by every replica, and survives restarts.
#[derive(Debug, Clone)]
pub struct PgEventLedger {
    pool: PgPool,
}

impl PgEventLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLedger for PgEventLedger {
    async fn claim(&self, event_id: &str, event_type: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, event_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM processed_webhook_events WHERE processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    /// event id -> (claim sequence, claimed at)
    claims: HashMap<String, (u64, DateTime<Utc>)>,
    next_sequence: u64,
}

/// Bounded in-process ledger
///
/// Only detects duplicates delivered to the same process. When full, the
/// oldest half of the claims is evicted.
#[derive(Debug)]
pub struct MemoryEventLedger {
    capacity: usize,
    state: Mutex<MemoryState>,
}

impl Default for MemoryEventLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryEventLedger {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of claims currently held
    pub fn len(&self) -> usize {
        self.lock().claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `event_id` is currently claimed
    pub fn contains(&self, event_id: &str) -> bool {
        self.lock().claims.contains_key(event_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim_at(&self, event_id: &str, at: DateTime<Utc>) -> bool {
        let mut state = self.lock();

        if state.claims.contains_key(event_id) {
            return false;
        }

        if state.claims.len() >= self.capacity {
            let mut by_age: Vec<(u64, String)> = state
                .claims
                .iter()
                .map(|(id, (seq, _))| (*seq, id.clone()))
                .collect();
            by_age.sort_unstable();

            let evict = by_age.len() / 2;
            for (_, id) in by_age.into_iter().take(evict) {
                state.claims.remove(&id);
            }
            debug!(evicted = evict, "Evicted oldest webhook claims from memory ledger");
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.claims.insert(event_id.to_string(), (sequence, at));
        true
    }
}

#[async_trait]
impl EventLedger for MemoryEventLedger {
    async fn claim(&self, event_id: &str, _event_type: &str) -> Result<bool, sqlx::Error> {
        Ok(self.claim_at(event_id, Utc::now()))
    }

    async fn release(&self, event_id: &str) -> Result<(), sqlx::Error> {
        self.lock().claims.remove(event_id);
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let mut state = self.lock();
        let before = state.claims.len();
        state.claims.retain(|_, (_, at)| *at >= cutoff);
        Ok((before - state.claims.len()) as u64)
    }
}

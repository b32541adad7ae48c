/// Background maintenance
///
/// Expires webhook event IDs from the idempotency ledger once they are older
/// than the configured retention. Stripe stops retrying after three days, so
/// anything past the retention window can no longer arrive as a duplicate.

use chrono::{Duration as ChronoDuration, Utc};
use mealplan_shared::billing::ledger::EventLedger;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often the ledger is purged
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Deletes ledger entries older than `retention_days`
pub async fn purge_ledger(
    ledger: &dyn EventLedger,
    retention_days: i64,
) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - ChronoDuration::days(retention_days);
    let purged = ledger.purge_older_than(cutoff).await?;

    if purged > 0 {
        tracing::info!(purged, cutoff = %cutoff, "Purged expired webhook events");
    } else {
        tracing::debug!(cutoff = %cutoff, "No expired webhook events");
    }

    Ok(purged)
}

/// Runs [`purge_ledger`] every `interval` until `shutdown` is cancelled
///
/// The first purge runs immediately.
pub fn spawn_ledger_purge(
    ledger: Arc<dyn EventLedger>,
    retention_days: i64,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Ledger purge task stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = purge_ledger(ledger.as_ref(), retention_days).await {
                        tracing::error!(error = %e, "Failed to purge webhook event ledger");
                    }
                }
            }
        }
    })
}

//! Background reconciliation sweeper.
//!
//! Records expire out-of-band through the store's per-key TTL, which leaves
//! stale entries behind in the secondary indexes. Each sweep asks the store
//! for every index entry whose predicted expiry has passed and prunes those
//! ids from all four indexes in one batch. The sweep only cleans up index
//! staleness; record expiry itself never depends on it.

use crate::metrics::{SWEEP_DURATION, SWEEP_FAILURES, SWEEP_PRUNED_ENTRIES, SWEEP_RUNS};
use ember_store::{PostStore, StoreResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Run a single sweep pass against `now`.
///
/// Returns the number of ids pruned from the indexes. An empty candidate
/// list is a no-op.
pub async fn sweep_once(store: &dyn PostStore, now: OffsetDateTime) -> StoreResult<usize> {
    let expired = store.expiring_before(now).await?;
    if expired.is_empty() {
        return Ok(0);
    }

    store.prune_index_entries(&expired).await?;
    Ok(expired.len())
}

/// Spawn the periodic sweeper task.
///
/// Single-flight by construction: one task, and the next tick is not
/// processed until the current sweep finishes. Sweep failures are logged
/// and counted, never escalated; the task exits only when `shutdown`
/// flips to true.
pub fn spawn_sweeper(
    store: Arc<dyn PostStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = interval.as_secs(),
            "Expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Expiry sweeper shutting down");
                        return;
                    }
                    continue;
                }
            }

            SWEEP_RUNS.inc();
            let start_time = Instant::now();

            match sweep_once(store.as_ref(), OffsetDateTime::now_utc()).await {
                Ok(0) => {
                    tracing::debug!("Sweep found nothing to prune");
                }
                Ok(pruned) => {
                    SWEEP_PRUNED_ENTRIES.inc_by(pruned as u64);
                    tracing::info!(pruned, "Sweep pruned expired index entries");
                }
                Err(e) => {
                    SWEEP_FAILURES.inc();
                    tracing::warn!(error = %e, "Sweep failed, retrying on next tick");
                }
            }

            SWEEP_DURATION.observe(start_time.elapsed().as_secs_f64());
        }
    })
}

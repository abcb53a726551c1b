//! Periodic console summary of the aggregated statistics
//!
//! Optional: the orchestrator only spawns this task when a report interval
//! is configured. The wait is cancellation-aware, so shutdown never has to
//! sit out a full interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregator::MetricsAggregator;

/// Emit one snapshot summary line per interval until cancelled.
pub async fn run(
    metrics: Arc<MetricsAggregator>,
    interval_sec: u64,
    cancel: CancellationToken,
) {
    let period = Duration::from_secs(interval_sec.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; consume it so the first report
    // lands one full interval after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = metrics.snapshot();
                info!(
                    orders_per_min = snapshot.orders_per_min,
                    failure_rate_pct = snapshot.failure_rate_pct,
                    inventory_events = snapshot.inventory_events,
                    window_seconds = snapshot.window_seconds,
                    "analytics summary"
                );
            }
        }
    }

    info!("reporter stopped");
}

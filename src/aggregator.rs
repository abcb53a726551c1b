//! Thread-safe metrics aggregation over the sliding windows
//!
//! The aggregator is the only shared mutable state in the process: the
//! stream worker records into it, while the reporter and the query endpoint
//! read snapshots from it. All window state sits behind a single mutex and
//! every operation is CPU-only, so no caller ever blocks on I/O under the
//! lock.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::unix_now;
use crate::window::{BooleanEventWindow, UniqueKeyWindow};

/// Point-in-time view of the aggregated statistics.
///
/// Produced fresh on every query and never cached; this is also the exact
/// wire document served by the query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique orders in the window, normalized to a per-minute rate.
    pub orders_per_min: f64,
    /// Inventory events currently inside the window.
    pub inventory_events: u64,
    /// Inventory events inside the window flagged as failures.
    pub failures: u64,
    /// `failures / inventory_events * 100`, or 0.0 when the window is empty.
    pub failure_rate_pct: f64,
    /// Configured window length in seconds.
    pub window_seconds: u64,
    /// Unix time the snapshot was taken.
    pub generated_at: f64,
}

/// Window state and lifetime counters, guarded by the aggregator lock.
#[derive(Debug)]
struct Inner {
    orders: UniqueKeyWindow,
    inventory: BooleanEventWindow,
    orders_total: u64,
    inventory_total: u64,
    duplicates_total: u64,
}

/// Owns all window state and serializes concurrent record/snapshot calls.
#[derive(Debug)]
pub struct MetricsAggregator {
    window_seconds: u64,
    inner: Mutex<Inner>,
}

impl MetricsAggregator {
    /// Create an aggregator over a window of `window_seconds` (clamped >= 1).
    pub fn new(window_seconds: u64) -> Self {
        let window_seconds = window_seconds.max(1);
        Self {
            window_seconds,
            inner: Mutex::new(Inner {
                orders: UniqueKeyWindow::new(window_seconds as f64),
                inventory: BooleanEventWindow::new(window_seconds as f64),
                orders_total: 0,
                inventory_total: 0,
                duplicates_total: 0,
            }),
        }
    }

    /// Record an order event observed at time `now`.
    ///
    /// Events without a resolvable order identifier are counted in the
    /// lifetime total but not tracked in the uniqueness window.
    pub fn record_order(&self, order_id: Option<&str>, now: f64) {
        let mut inner = self.inner.lock();
        inner.orders_total += 1;
        if let Some(order_id) = order_id {
            inner.orders.track(order_id, now);
        }
    }

    /// Record an inventory event observed at time `now`.
    pub fn record_inventory(&self, is_failure: bool, now: f64) {
        let mut inner = self.inner.lock();
        inner.inventory_total += 1;
        inner.inventory.track(is_failure, now);
    }

    /// Record a suppressed duplicate delivery.
    pub fn record_duplicate(&self) {
        self.inner.lock().duplicates_total += 1;
    }

    /// Unique orders live in the window ending at `now`.
    pub fn active_orders(&self, now: f64) -> usize {
        self.inner.lock().orders.count(now)
    }

    /// Lifetime count of suppressed duplicate deliveries.
    pub fn duplicates_total(&self) -> u64 {
        self.inner.lock().duplicates_total
    }

    /// Take a snapshot against the current wall clock.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_at(unix_now())
    }

    /// Take a snapshot at an explicit time.
    ///
    /// All fields derive from a single lock acquisition, so a snapshot never
    /// observes a partially applied record call.
    pub fn snapshot_at(&self, now: f64) -> Snapshot {
        let mut inner = self.inner.lock();
        let (inventory_events, failures) = inner.inventory.totals(now);
        Snapshot {
            orders_per_min: inner.orders.rate_per_minute(now),
            inventory_events,
            failures,
            failure_rate_pct: inner.inventory.rate_pct(now),
            window_seconds: self.window_seconds,
            generated_at: now,
        }
    }
}

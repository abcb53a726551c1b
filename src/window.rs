//! Sliding-window counters for the metrics aggregator
//!
//! Two eviction-on-read window structures share the same discipline: entries
//! whose timestamp falls before `now - window` are dropped at the start of
//! every read or write, never by a background sweep. Callers supply the
//! clock explicitly, which keeps the structures deterministic under test.

use std::collections::{HashMap, VecDeque};

/// Tracks the most recent sighting per key inside a sliding window.
///
/// Re-tracking a key refreshes its timestamp, so membership slides with
/// every occurrence rather than counting individual events.
#[derive(Debug)]
pub struct UniqueKeyWindow {
    /// Window length in seconds (clamped to >= 1).
    window: f64,
    /// Key -> timestamp of its most recent sighting.
    entries: HashMap<String, f64>,
    /// Insertion-ordered (timestamp, key) pairs for eviction.
    order: VecDeque<(f64, String)>,
}

impl UniqueKeyWindow {
    pub fn new(window_seconds: f64) -> Self {
        Self {
            window: window_seconds.max(1.0),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record a sighting of `key` at time `now`.
    pub fn track(&mut self, key: &str, now: f64) {
        self.entries.insert(key.to_string(), now);
        self.order.push_back((now, key.to_string()));
        self.evict(now);
    }

    /// Number of keys seen within the window ending at `now`.
    pub fn count(&mut self, now: f64) -> usize {
        self.evict(now);
        self.entries.len()
    }

    /// Live key count normalized to a per-minute rate.
    pub fn rate_per_minute(&mut self, now: f64) -> f64 {
        (self.count(now) as f64 * 60.0) / self.window
    }

    /// Drop deque entries outside the window. A key is removed only when
    /// the expiring entry is still its latest sighting; stale deque entries
    /// for re-tracked keys are discarded without touching the map.
    fn evict(&mut self, now: f64) {
        let cutoff = now - self.window;
        while let Some((ts, _)) = self.order.front() {
            if *ts >= cutoff {
                break;
            }
            if let Some((ts, key)) = self.order.pop_front() {
                if self.entries.get(&key) == Some(&ts) {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

/// Counts boolean-tagged events inside a sliding window.
///
/// The true-flagged count is maintained incrementally (decremented as
/// flagged entries expire) so reads never rescan the window.
#[derive(Debug)]
pub struct BooleanEventWindow {
    /// Window length in seconds (clamped to >= 1).
    window: f64,
    /// (timestamp, flag) pairs in arrival order.
    events: VecDeque<(f64, bool)>,
    /// Running count of true-flagged entries still in the window.
    true_count: u64,
}

impl BooleanEventWindow {
    pub fn new(window_seconds: f64) -> Self {
        Self {
            window: window_seconds.max(1.0),
            events: VecDeque::new(),
            true_count: 0,
        }
    }

    /// Record an event with the given flag at time `now`.
    pub fn track(&mut self, flag: bool, now: f64) {
        self.events.push_back((now, flag));
        if flag {
            self.true_count += 1;
        }
        self.evict(now);
    }

    /// Total and true-flagged event counts within the window ending at `now`.
    pub fn totals(&mut self, now: f64) -> (u64, u64) {
        self.evict(now);
        (self.events.len() as u64, self.true_count)
    }

    /// Percentage of events flagged true; 0.0 for an empty window.
    pub fn rate_pct(&mut self, now: f64) -> f64 {
        let (total, flagged) = self.totals(now);
        if total == 0 {
            return 0.0;
        }
        flagged as f64 / total as f64 * 100.0
    }

    fn evict(&mut self, now: f64) {
        let cutoff = now - self.window;
        while let Some((ts, _)) = self.events.front() {
            if *ts >= cutoff {
                break;
            }
            if let Some((_, flag)) = self.events.pop_front() {
                if flag {
                    self.true_count = self.true_count.saturating_sub(1);
                }
            }
        }
    }
}

//! Bounded time-window duplicate detection for delivered events
//!
//! Tracks event identities seen within a trailing TTL so redeliveries from
//! the bus (at-least-once semantics) are counted once. Expired identities
//! are evicted lazily at the head of every registration, never by a
//! background timer, so eviction cost stays proportional to the actual
//! expired volume.

use std::collections::{HashMap, VecDeque};

/// Sliding-TTL set membership test for event identities.
///
/// `register` answers "was this identity seen within the last `ttl`
/// seconds?" and records it if not. Lookup and insert are O(1) expected;
/// eviction is amortized O(expired count).
#[derive(Debug)]
pub struct DuplicateFilter {
    /// Retention horizon in seconds (clamped to >= 1).
    ttl: f64,
    /// Identity -> timestamp of first sighting within the horizon.
    seen: HashMap<String, f64>,
    /// Insertion-ordered (timestamp, identity) pairs for eviction.
    order: VecDeque<(f64, String)>,
}

impl DuplicateFilter {
    /// Create a filter retaining identities for `ttl_seconds`.
    pub fn new(ttl_seconds: f64) -> Self {
        Self {
            ttl: ttl_seconds.max(1.0),
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Register an identity at time `now`.
    ///
    /// Returns `true` if the identity was already registered within the
    /// trailing TTL (a duplicate); otherwise records it and returns `false`.
    /// A duplicate sighting does not refresh the original timestamp.
    pub fn register(&mut self, event_id: &str, now: f64) -> bool {
        self.evict(now);
        if self.seen.contains_key(event_id) {
            return true;
        }
        self.seen.insert(event_id.to_string(), now);
        self.order.push_back((now, event_id.to_string()));
        false
    }

    /// Number of identities currently retained.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no identities are currently retained.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop identities whose registration fell out of the TTL horizon.
    fn evict(&mut self, now: f64) {
        let cutoff = now - self.ttl;
        while let Some((ts, _)) = self.order.front() {
            if *ts >= cutoff {
                break;
            }
            if let Some((_, event_id)) = self.order.pop_front() {
                self.seen.remove(&event_id);
            }
        }
    }
}

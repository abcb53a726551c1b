//! Wall-clock access for window and dedup timestamps.
//!
//! All window structures take explicit `now` arguments so tests can drive
//! them with a simulated clock; this module is the single place the real
//! clock is read.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current Unix time in seconds, as a float (sub-second precision).
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

//! Streaming analytics aggregator
//!
//! Consumes the order-placed and inventory-result topics from Kafka with
//! manual offset commits, suppresses redelivered events inside a sliding
//! time horizon, and maintains windowed statistics (orders/minute,
//! inventory failure rate, active unique orders) served as point-in-time
//! snapshots over HTTP and, optionally, on a fixed reporting cadence.
//!
//! # Architecture
//!
//! ```text
//!  Kafka (orders, inventory)
//!        │
//!   ┌────▼────────┐
//!   │StreamWorker │  ← decode, dedup, classify, record, commit
//!   └────┬────────┘
//!        │
//!   ┌────▼─────────────┐
//!   │MetricsAggregator │  ← sliding windows + lifetime counters
//!   └────┬────────┬────┘
//!        │        │
//!   ┌────▼───┐ ┌──▼──────────┐
//!   │Reporter│ │ HTTP /metrics│
//!   └────────┘ └─────────────┘
//! ```

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod consumer;
pub mod dedup;
pub mod events;
pub mod reporter;
pub mod server;
pub mod window;

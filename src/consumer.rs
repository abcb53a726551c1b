//! Kafka consume/decode/commit loop
//!
//! The worker pulls from both event topics with auto-commit disabled and
//! commits each offset synchronously only after the message's effect is
//! reflected in the aggregator. A crash between recording and commit causes
//! redelivery, which the dedup filter then suppresses — at-least-once
//! consumption with duplicate-safe reprocessing.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::MetricsAggregator;
use crate::clock::unix_now;
use crate::config::Config;
use crate::dedup::DuplicateFilter;
use crate::events::{event_identity, resolve_order_id, Payload};

/// Errors that terminate the worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("kafka consumer error: {0}")]
    Bus(#[from] KafkaError),
}

/// How a single delivered message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded, deduplicated, and recorded into the aggregator.
    Recorded,
    /// Suppressed redelivery; counted in the duplicate metric.
    Duplicate,
    /// Malformed payload; not recorded and the offset must not advance.
    Skipped,
    /// Message from an unexpected topic; logged and dropped.
    Ignored,
}

impl Outcome {
    /// Whether the message's offset should be committed.
    ///
    /// Everything commits except a decode failure, which leaves the message
    /// available on the bus for redelivery and inspection.
    pub fn commits(&self) -> bool {
        !matches!(self, Outcome::Skipped)
    }
}

/// Consumes the order and inventory topics and feeds the aggregator.
pub struct StreamWorker {
    consumer: StreamConsumer,
    metrics: Arc<MetricsAggregator>,
    dedup: DuplicateFilter,
    order_topic: String,
    inventory_topic: String,
    throttle: Duration,
    cancel: CancellationToken,
}

impl StreamWorker {
    /// Build the consumer, subscribe to both topics, and prepare the loop.
    pub fn new(
        config: &Config,
        metrics: Arc<MetricsAggregator>,
        cancel: CancellationToken,
    ) -> Result<Self, WorkerError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false");
        if let Some(instance_id) = &config.group_instance_id {
            client_config.set("group.instance.id", instance_id);
        }

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[&config.order_topic, &config.inventory_topic])?;

        info!(
            order_topic = %config.order_topic,
            inventory_topic = %config.inventory_topic,
            group_id = %config.group_id,
            "stream worker subscribed"
        );

        Ok(Self {
            consumer,
            metrics,
            dedup: DuplicateFilter::new(config.window_sec as f64),
            order_topic: config.order_topic.clone(),
            inventory_topic: config.inventory_topic.clone(),
            throttle: Duration::from_millis(config.throttle_ms),
            cancel,
        })
    }

    /// Run the consume loop until cancellation or a fatal bus error.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = self.consumer.recv() => received,
            };

            match received {
                Ok(message) => {
                    let outcome = process_message(
                        &self.order_topic,
                        &self.inventory_topic,
                        &mut self.dedup,
                        &self.metrics,
                        message.topic(),
                        message.key(),
                        message.payload(),
                        unix_now(),
                    );
                    if outcome.commits() {
                        self.consumer.commit_message(&message, CommitMode::Sync)?;
                        if !self.throttle.is_zero() {
                            tokio::time::sleep(self.throttle).await;
                        }
                    }
                }
                Err(KafkaError::PartitionEOF(_)) => continue,
                Err(err) if is_topic_not_ready(&err) => {
                    warn!(error = %err, "topic not available yet; retrying poll");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(err) => {
                    error!(error = %err, "fatal bus error in stream worker");
                    return Err(WorkerError::Bus(err));
                }
            }
        }

        // Dropping the consumer leaves the group and releases partitions.
        info!("stream worker stopped");
        Ok(())
    }
}

/// Transient "topic missing" condition during startup, before the external
/// topic waiter has created the topics.
fn is_topic_not_ready(err: &KafkaError) -> bool {
    matches!(
        err.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::UnknownTopicOrPartition
                | RDKafkaErrorCode::UnknownTopic
                | RDKafkaErrorCode::UnknownPartition
        )
    )
}

/// Handle one delivered message: decode, deduplicate, classify, record.
///
/// Bus-free so the full per-message state machine is testable without a
/// broker; the caller owns the commit decision via [`Outcome::commits`].
#[allow(clippy::too_many_arguments)]
pub fn process_message(
    order_topic: &str,
    inventory_topic: &str,
    dedup: &mut DuplicateFilter,
    metrics: &MetricsAggregator,
    topic: &str,
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
    now: f64,
) -> Outcome {
    let payload = match Payload::decode(payload) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(topic, error = %err, "skipping undecodable message");
            return Outcome::Skipped;
        }
    };

    let identity = event_identity(topic, key, &payload);
    if dedup.register(&identity, now) {
        metrics.record_duplicate();
        debug!(topic, identity = %identity, "suppressed duplicate delivery");
        return Outcome::Duplicate;
    }

    if topic == order_topic {
        metrics.record_order(resolve_order_id(key, &payload).as_deref(), now);
    } else if topic == inventory_topic {
        metrics.record_inventory(payload.status_is_failure(), now);
    } else {
        warn!(topic, "ignoring message from unexpected topic");
        return Outcome::Ignored;
    }

    Outcome::Recorded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (DuplicateFilter, MetricsAggregator) {
        (DuplicateFilter::new(60.0), MetricsAggregator::new(60))
    }

    fn process(
        dedup: &mut DuplicateFilter,
        metrics: &MetricsAggregator,
        topic: &str,
        key: Option<&[u8]>,
        payload: Option<&[u8]>,
        now: f64,
    ) -> Outcome {
        process_message("orders", "inventory", dedup, metrics, topic, key, payload, now)
    }

    #[test]
    fn test_order_event_recorded() {
        let (mut dedup, metrics) = setup();
        let outcome = process(
            &mut dedup,
            &metrics,
            "orders",
            Some(b"o-1"),
            Some(br#"{"order_id": "o-1"}"#),
            100.0,
        );
        assert_eq!(outcome, Outcome::Recorded);
        assert!(outcome.commits());
        assert_eq!(metrics.active_orders(100.0), 1);
    }

    #[test]
    fn test_inventory_failure_recorded() {
        let (mut dedup, metrics) = setup();
        let outcome = process(
            &mut dedup,
            &metrics,
            "inventory",
            None,
            Some(br#"{"status": "FAILURE"}"#),
            100.0,
        );
        assert_eq!(outcome, Outcome::Recorded);
        let snapshot = metrics.snapshot_at(100.0);
        assert_eq!(snapshot.inventory_events, 1);
        assert_eq!(snapshot.failures, 1);
    }

    #[test]
    fn test_decode_failure_skips_without_commit() {
        let (mut dedup, metrics) = setup();
        let before = metrics.snapshot_at(100.0);

        let outcome = process(
            &mut dedup,
            &metrics,
            "orders",
            Some(b"o-1"),
            Some(b"{broken"),
            100.0,
        );

        assert_eq!(outcome, Outcome::Skipped);
        assert!(!outcome.commits());
        let after = metrics.snapshot_at(100.0);
        assert_eq!(before, after);
        assert_eq!(metrics.duplicates_total(), 0);
    }

    #[test]
    fn test_redelivery_records_once() {
        let (mut dedup, metrics) = setup();
        let payload: &[u8] = br#"{"order_id": "o-1"}"#;

        let first = process(&mut dedup, &metrics, "orders", Some(b"o-1"), Some(payload), 100.0);
        assert_eq!(first, Outcome::Recorded);
        assert_eq!(metrics.duplicates_total(), 0);

        let second = process(&mut dedup, &metrics, "orders", Some(b"o-1"), Some(payload), 101.0);
        assert_eq!(second, Outcome::Duplicate);
        assert!(second.commits());
        assert_eq!(metrics.duplicates_total(), 1);
        assert_eq!(metrics.active_orders(101.0), 1);
        assert_eq!(metrics.snapshot_at(101.0).orders_per_min, 1.0);
    }

    #[test]
    fn test_unexpected_topic_ignored_but_committed() {
        let (mut dedup, metrics) = setup();
        let outcome = process(&mut dedup, &metrics, "notifications", None, Some(b"{}"), 100.0);
        assert_eq!(outcome, Outcome::Ignored);
        assert!(outcome.commits());
        assert_eq!(metrics.snapshot_at(100.0).orders_per_min, 0.0);
    }

    #[test]
    fn test_order_without_any_id_counts_but_untracked() {
        let (mut dedup, metrics) = setup();
        let outcome = process(&mut dedup, &metrics, "orders", None, Some(b"{}"), 100.0);
        assert_eq!(outcome, Outcome::Recorded);
        assert_eq!(metrics.active_orders(100.0), 0);
    }

    #[test]
    fn test_empty_payload_decodes_to_empty_map() {
        let (mut dedup, metrics) = setup();
        let outcome = process(&mut dedup, &metrics, "inventory", None, None, 100.0);
        assert_eq!(outcome, Outcome::Recorded);
        let snapshot = metrics.snapshot_at(100.0);
        assert_eq!(snapshot.inventory_events, 1);
        assert_eq!(snapshot.failures, 0);
    }
}

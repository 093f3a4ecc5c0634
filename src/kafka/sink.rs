//! Kafka export sink.
//!
//! [`ExportSink`] adapts "a new binding set was derived" events into
//! messages on a Kafka topic: each pushed binding set is encoded with the
//! wire codec and appended under a 4-byte big-endian integer key. The sink
//! is pushed to, one binding set at a time; it never retains a binding set
//! after encoding.
//!
//! `publish` takes `&self` and the underlying producer is safe for
//! concurrent use, so multiple evaluation-engine workers can publish
//! through one sink. Each call resolves once the broker acknowledges the
//! append at the configured level.

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info, warn};

use crate::binding::BindingSet;
use crate::codec;
use crate::config::{BridgeConfig, BridgeState};
use crate::error::BridgeError;
use crate::supervisor::{DeliveryReceipt, ResultPublisher};

use super::metrics::{ExportMetrics, ExportMetricsSnapshot};
use super::sink_config::ExportConfig;

/// Kafka producer for encoded binding sets.
///
/// # Lifecycle
///
/// 1. Create with [`ExportSink::new`] or [`ExportSink::from_bridge_config`]
/// 2. Call `open()` to connect to the broker
/// 3. Push binding sets via `export()` / `publish()`
/// 4. Call `close()` to flush in-flight messages and release the connection
pub struct ExportSink {
    /// rdkafka producer (set during `open()`). Exclusively owned by this
    /// instance; no global connection pool.
    producer: Option<FutureProducer>,
    /// Parsed sink configuration.
    config: ExportConfig,
    /// Lifecycle state.
    state: BridgeState,
    /// Publish counters.
    metrics: ExportMetrics,
}

impl ExportSink {
    /// Creates a sink from a parsed configuration.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self {
            producer: None,
            config,
            state: BridgeState::Created,
            metrics: ExportMetrics::new(),
        }
    }

    /// Creates a sink by parsing a string-keyed [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MissingConfig`] or
    /// [`BridgeError::ConfigurationError`] on an invalid configuration.
    pub fn from_bridge_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Ok(Self::new(ExportConfig::from_config(config)?))
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Returns the parsed configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Returns a snapshot of the publish counters.
    #[must_use]
    pub fn metrics(&self) -> ExportMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Connects to the broker.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TransportUnavailable`] if the producer cannot
    /// be created.
    pub fn open(&mut self) -> Result<(), BridgeError> {
        info!(
            brokers = %self.config.bootstrap_servers,
            topic = %self.config.topic,
            acks = %self.config.acks,
            "opening export sink"
        );

        let producer: FutureProducer = self.config.to_rdkafka_config().create().map_err(|e| {
            BridgeError::TransportUnavailable(format!("failed to create producer: {e}"))
        })?;

        self.producer = Some(producer);
        self.state = BridgeState::Running;
        Ok(())
    }

    /// Encodes and publishes one binding set under an explicit key.
    ///
    /// Resolves once the broker acknowledges the append.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidState`] if the sink is not open
    /// - [`BridgeError::EncodingFailure`] propagated from the codec
    ///   (producer-side bug, not retryable)
    /// - [`BridgeError::TransportUnavailable`] on broker-level send failure
    ///   (retried by the delivery supervisor)
    pub async fn publish(
        &self,
        key: i32,
        bindings: &BindingSet,
    ) -> Result<DeliveryReceipt, BridgeError> {
        let producer = self.producer.as_ref().ok_or_else(|| {
            BridgeError::InvalidState {
                expected: BridgeState::Running.to_string(),
                actual: self.state.to_string(),
            }
        })?;

        let payload = codec::encode(bindings)?;
        let key_bytes = key.to_be_bytes();

        let record = FutureRecord::to(&self.config.topic)
            .key(&key_bytes[..])
            .payload(&payload);

        match producer
            .send(record, Timeout::After(self.config.delivery_timeout))
            .await
        {
            Ok((partition, offset)) => {
                self.metrics.record_publish(payload.len() as u64);
                debug!(
                    key,
                    partition,
                    offset,
                    bytes = payload.len(),
                    "binding set published"
                );
                Ok(DeliveryReceipt {
                    topic: self.config.topic.clone(),
                    partition,
                    offset,
                })
            }
            Err((e, _unsent)) => {
                self.metrics.record_error();
                warn!(key, error = %e, "publish failed");
                Err(BridgeError::TransportUnavailable(e.to_string()))
            }
        }
    }

    /// The push interface the evaluation engine calls with each newly
    /// derived result: derives the partition key with the configured
    /// [`super::KeyPolicy`] and publishes.
    ///
    /// # Errors
    ///
    /// Same as [`ExportSink::publish`].
    pub async fn export(&self, bindings: &BindingSet) -> Result<DeliveryReceipt, BridgeError> {
        let key = self.config.key_policy.derive(bindings);
        self.publish(key, bindings).await
    }

    /// Flushes in-flight messages and releases the broker connection.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TransportUnavailable`] if the flush times
    /// out; the connection is released either way.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        info!(topic = %self.config.topic, "closing export sink");

        let flush_result = match self.producer.take() {
            Some(producer) => producer
                .flush(Timeout::After(self.config.delivery_timeout))
                .map_err(|e| BridgeError::TransportUnavailable(format!("flush failed: {e}"))),
            None => Ok(()),
        };

        self.state = BridgeState::Closed;
        flush_result
    }
}

#[async_trait]
impl ResultPublisher for ExportSink {
    async fn publish(
        &self,
        key: i32,
        bindings: &BindingSet,
    ) -> Result<DeliveryReceipt, BridgeError> {
        ExportSink::publish(self, key, bindings).await
    }
}

impl std::fmt::Debug for ExportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSink")
            .field("state", &self.state)
            .field("topic", &self.config.topic)
            .field("acks", &self.config.acks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ExportConfig {
        let mut cfg = ExportConfig::default();
        cfg.bootstrap_servers = "localhost:9092".into();
        cfg.topic = "query-results".into();
        cfg
    }

    #[test]
    fn test_new_starts_created() {
        let sink = ExportSink::new(test_config());
        assert_eq!(sink.state(), BridgeState::Created);
        assert!(sink.producer.is_none());
    }

    #[tokio::test]
    async fn test_publish_before_open_is_invalid_state() {
        let sink = ExportSink::new(test_config());
        let err = sink.publish(42, &BindingSet::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState { .. }));
    }

    #[test]
    fn test_close_without_open() {
        let mut sink = ExportSink::new(test_config());
        sink.close().unwrap();
        assert_eq!(sink.state(), BridgeState::Closed);
    }

    #[test]
    fn test_metrics_initial() {
        let sink = ExportSink::new(test_config());
        let snap = sink.metrics();
        assert_eq!(snap.published_total, 0);
        assert_eq!(snap.errors_total, 0);
    }

    #[test]
    fn test_debug_output() {
        let sink = ExportSink::new(test_config());
        let debug = format!("{sink:?}");
        assert!(debug.contains("ExportSink"));
        assert!(debug.contains("query-results"));
    }
}

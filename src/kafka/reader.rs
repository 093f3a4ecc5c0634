//! Kafka intake reader.
//!
//! [`IntakeReader`] subscribes to a result topic and decodes binding-set
//! payloads back into [`BindingSet`] values. Malformed and
//! unsupported-version payloads are logged and skipped rather than failing
//! the batch, so one bad message never wedges the stream.
//!
//! Auto-commit is disabled; the reader tracks the highest observed offset
//! per partition and commits only when [`IntakeReader::commit`] is called
//! (normally by the intake supervisor, after a batch has reached the
//! caller). A crash between delivery and commit redelivers the window,
//! never loses it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use crate::binding::BindingSet;
use crate::codec;
use crate::config::{BridgeConfig, BridgeState};
use crate::error::BridgeError;

use super::metrics::{IntakeMetrics, IntakeMetricsSnapshot};
use super::reader_config::IntakeConfig;

/// One decoded message from the result topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRecord {
    /// Message key, when present and exactly 4 bytes big-endian.
    pub key: Option<i32>,
    /// The decoded binding set.
    pub bindings: BindingSet,
    /// Partition the message was read from.
    pub partition: i32,
    /// Offset of the message within its partition.
    pub offset: i64,
}

/// Kafka consumer that yields decoded binding sets in partition order.
///
/// # Lifecycle
///
/// 1. Create with [`IntakeReader::new`] or [`IntakeReader::from_bridge_config`]
/// 2. Call `open()` to connect and subscribe
/// 3. Drain batches via `poll_batch()`
/// 4. Call `close()` for a final synchronous offset commit
pub struct IntakeReader {
    /// rdkafka consumer (set during `open()`). Exclusively owned by this
    /// instance; no global connection pool.
    consumer: Option<StreamConsumer>,
    /// Parsed reader configuration.
    config: IntakeConfig,
    /// Lifecycle state.
    state: BridgeState,
    /// Highest observed offset per partition, not yet committed.
    offsets: HashMap<i32, i64>,
    /// Intake counters.
    metrics: IntakeMetrics,
}

impl IntakeReader {
    /// Creates a reader from a parsed configuration.
    #[must_use]
    pub fn new(config: IntakeConfig) -> Self {
        Self {
            consumer: None,
            config,
            state: BridgeState::Created,
            offsets: HashMap::new(),
            metrics: IntakeMetrics::new(),
        }
    }

    /// Creates a reader by parsing a string-keyed [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MissingConfig`] or
    /// [`BridgeError::ConfigurationError`] on an invalid configuration.
    pub fn from_bridge_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Ok(Self::new(IntakeConfig::from_config(config)?))
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Returns the parsed configuration.
    #[must_use]
    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Returns a snapshot of the intake counters.
    #[must_use]
    pub fn metrics(&self) -> IntakeMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Connects to the broker and subscribes to the configured topic.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TransportUnavailable`] if the consumer cannot
    /// be created or the subscription is rejected.
    pub fn open(&mut self) -> Result<(), BridgeError> {
        info!(
            brokers = %self.config.bootstrap_servers,
            topic = %self.config.topic,
            group = %self.config.group_id,
            offset_reset = %self.config.offset_reset,
            "opening intake reader"
        );

        let consumer: StreamConsumer = self.config.to_rdkafka_config().create().map_err(|e| {
            BridgeError::TransportUnavailable(format!("failed to create consumer: {e}"))
        })?;

        consumer
            .subscribe(&[self.config.topic.as_str()])
            .map_err(|e| BridgeError::TransportUnavailable(format!("subscribe failed: {e}")))?;

        self.consumer = Some(consumer);
        self.state = BridgeState::Running;
        Ok(())
    }

    /// Polls for up to `max_records` decoded records, waiting at most
    /// `timeout` in total.
    ///
    /// Returns an empty batch when the timeout elapses with nothing
    /// available. Malformed and unsupported-version payloads are skipped
    /// (counted in the metrics); their offsets still advance so they are
    /// not redelivered forever.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] if the reader is not open.
    pub async fn poll_batch(
        &mut self,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<IntakeRecord>, BridgeError> {
        let consumer = self.consumer.as_ref().ok_or_else(|| {
            BridgeError::InvalidState {
                expected: BridgeState::Running.to_string(),
                actual: self.state.to_string(),
            }
        })?;

        let deadline = Instant::now() + timeout;
        let mut batch = Vec::new();

        while batch.len() < max_records {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let message = match tokio::time::timeout(remaining, consumer.recv()).await {
                Ok(Ok(message)) => message,
                Ok(Err(e)) => {
                    warn!(error = %e, "consumer poll error");
                    continue;
                }
                Err(_elapsed) => break,
            };

            let partition = message.partition();
            let offset = message.offset();
            self.offsets
                .entry(partition)
                .and_modify(|o| *o = (*o).max(offset))
                .or_insert(offset);

            let Some(payload) = message.payload() else {
                warn!(partition, offset, "empty payload, skipping");
                self.metrics.record_malformed_skip();
                continue;
            };

            match codec::decode(payload) {
                Ok(bindings) => {
                    self.metrics.record_record(payload.len() as u64);
                    batch.push(IntakeRecord {
                        key: parse_key(message.key()),
                        bindings,
                        partition,
                        offset,
                    });
                }
                Err(BridgeError::UnsupportedVersion { found, expected }) => {
                    warn!(
                        partition,
                        offset, found, expected, "unsupported payload version, skipping"
                    );
                    self.metrics.record_version_skip();
                }
                Err(e) => {
                    warn!(partition, offset, error = %e, "malformed payload, skipping");
                    self.metrics.record_malformed_skip();
                }
            }
        }

        debug!(records = batch.len(), "poll batch complete");
        Ok(batch)
    }

    /// Returns whether any observed offsets are waiting to be committed.
    #[must_use]
    pub fn has_uncommitted_offsets(&self) -> bool {
        !self.offsets.is_empty()
    }

    /// Commits the highest observed offset per partition (asynchronously).
    ///
    /// Commits `observed + 1` per partition, the position the group should
    /// resume from.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] if the reader is not open, or
    /// [`BridgeError::TransportUnavailable`] if the commit is rejected.
    pub fn commit(&mut self) -> Result<(), BridgeError> {
        self.commit_with_mode(CommitMode::Async)
    }

    fn commit_with_mode(&mut self, mode: CommitMode) -> Result<(), BridgeError> {
        let consumer = self.consumer.as_ref().ok_or_else(|| {
            BridgeError::InvalidState {
                expected: BridgeState::Running.to_string(),
                actual: self.state.to_string(),
            }
        })?;

        if self.offsets.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (&partition, &offset) in &self.offsets {
            tpl.add_partition_offset(&self.config.topic, partition, Offset::Offset(offset + 1))
                .map_err(|e| {
                    BridgeError::TransportUnavailable(format!("offset list rejected: {e}"))
                })?;
        }

        consumer
            .commit(&tpl, mode)
            .map_err(|e| BridgeError::TransportUnavailable(format!("commit failed: {e}")))?;

        debug!(partitions = self.offsets.len(), "offsets committed");
        self.offsets.clear();
        Ok(())
    }

    /// Commits outstanding offsets synchronously, unsubscribes, and
    /// releases the broker connection.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TransportUnavailable`] if the final commit is
    /// rejected; the connection is released either way.
    pub fn close(&mut self) -> Result<(), BridgeError> {
        info!(topic = %self.config.topic, group = %self.config.group_id, "closing intake reader");

        let commit_result = if self.consumer.is_some() && !self.offsets.is_empty() {
            self.commit_with_mode(CommitMode::Sync)
        } else {
            Ok(())
        };

        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
        }
        self.state = BridgeState::Closed;
        commit_result
    }
}

impl std::fmt::Debug for IntakeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeReader")
            .field("state", &self.state)
            .field("topic", &self.config.topic)
            .field("group_id", &self.config.group_id)
            .field("uncommitted_partitions", &self.offsets.len())
            .finish_non_exhaustive()
    }
}

/// Parses a 4-byte big-endian message key. Anything else is `None`.
fn parse_key(key: Option<&[u8]>) -> Option<i32> {
    let bytes: [u8; 4] = key?.try_into().ok()?;
    Some(i32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> IntakeConfig {
        let mut cfg = IntakeConfig::default();
        cfg.bootstrap_servers = "localhost:9092".into();
        cfg.topic = "query-results".into();
        cfg.group_id = "group0".into();
        cfg
    }

    #[test]
    fn test_new_starts_created() {
        let reader = IntakeReader::new(test_config());
        assert_eq!(reader.state(), BridgeState::Created);
        assert!(!reader.has_uncommitted_offsets());
    }

    #[tokio::test]
    async fn test_poll_before_open_is_invalid_state() {
        let mut reader = IntakeReader::new(test_config());
        let err = reader
            .poll_batch(10, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState { .. }));
    }

    #[test]
    fn test_commit_before_open_is_invalid_state() {
        let mut reader = IntakeReader::new(test_config());
        assert!(matches!(
            reader.commit(),
            Err(BridgeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_close_without_open() {
        let mut reader = IntakeReader::new(test_config());
        reader.close().unwrap();
        assert_eq!(reader.state(), BridgeState::Closed);
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key(Some(&42i32.to_be_bytes())), Some(42));
        assert_eq!(parse_key(Some(&(-7i32).to_be_bytes())), Some(-7));
        assert_eq!(parse_key(Some(&[0x01, 0x02])), None);
        assert_eq!(parse_key(Some(&[0; 8])), None);
        assert_eq!(parse_key(None), None);
    }

    #[test]
    fn test_debug_output() {
        let reader = IntakeReader::new(test_config());
        let debug = format!("{reader:?}");
        assert!(debug.contains("IntakeReader"));
        assert!(debug.contains("query-results"));
    }
}

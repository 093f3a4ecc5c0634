//! Kafka transport: export sink, intake reader, topic admin, metrics.
//!
//! Each sink or reader instance exclusively owns its broker connection;
//! there is no implicit global connection pool. Configuration is parsed
//! from a [`crate::BridgeConfig`] and converted to an
//! [`rdkafka::ClientConfig`] per instance.

pub mod admin;
pub mod metrics;
pub mod reader;
pub mod reader_config;
pub mod sink;
pub mod sink_config;

pub use admin::ensure_topic;
pub use metrics::{ExportMetrics, ExportMetricsSnapshot, IntakeMetrics, IntakeMetricsSnapshot};
pub use reader::{IntakeReader, IntakeRecord};
pub use reader_config::{IntakeConfig, OffsetReset};
pub use sink::ExportSink;
pub use sink_config::{Acks, ExportConfig, KeyPolicy};

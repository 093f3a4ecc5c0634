//! Broker-backed smoke tests for the export/intake path.
//!
//! Validates the full bridge round trip:
//! 1. Topic is created (1 partition, replication 1)
//! 2. A binding set is encoded and published under an integer key
//! 3. A fresh consumer group subscribed from earliest receives it
//! 4. The decoded binding set, key, and visibility match what was sent
//!
//! These tests need a reachable Kafka broker and are `#[ignore]`d by
//! default. Point `BINDFLOW_TEST_BROKERS` at a broker (defaults to
//! `localhost:9092`) and run with `cargo test -- --ignored`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bindflow::kafka::{ensure_topic, ExportSink, IntakeReader, OffsetReset};
use bindflow::supervisor::DeliverySupervisor;
use bindflow::{BindingSet, BridgeConfig, Term};

fn brokers() -> String {
    std::env::var("BINDFLOW_TEST_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

/// Unique per-run topic name so reruns never see stale messages.
fn unique_topic(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sink_config(topic: &str) -> BridgeConfig {
    let mut config = BridgeConfig::new("export");
    config.set("bootstrap.servers", brokers());
    config.set("topic", topic);
    config.set("acks", "all");
    config
}

fn reader_config(topic: &str, group: &str) -> BridgeConfig {
    let mut config = BridgeConfig::new("intake");
    config.set("bootstrap.servers", brokers());
    config.set("topic", topic);
    config.set("group.id", group);
    config.set("offset.reset", "earliest");
    config
}

fn sample_bindings() -> BindingSet {
    let mut bindings = BindingSet::with_visibility("A&B");
    bindings.insert("x", Term::identifier("urn:example:s"));
    bindings.insert("y", Term::typed_literal("42", "integer"));
    bindings
}

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn smoke_publish_and_consume_one_binding_set() {
    init_tracing();
    let topic = unique_topic("bindflow-smoke");

    ensure_topic(&brokers(), &topic, 1, 1).await.unwrap();
    // Creating an existing topic must be a no-op, not an error.
    ensure_topic(&brokers(), &topic, 1, 1).await.unwrap();

    let mut sink = ExportSink::from_bridge_config(&sink_config(&topic)).unwrap();
    sink.open().unwrap();

    let sent = sample_bindings();
    let receipt = sink.publish(42, &sent).await.unwrap();
    assert_eq!(receipt.topic, topic);
    assert_eq!(receipt.partition, 0);
    sink.close().unwrap();

    let mut reader = IntakeReader::from_bridge_config(&reader_config(&topic, "smoke-g0")).unwrap();
    assert_eq!(reader.config().offset_reset, OffsetReset::Earliest);
    reader.open().unwrap();

    let batch = reader.poll_batch(10, Duration::from_secs(3)).await.unwrap();
    assert_eq!(batch.len(), 1, "expected exactly one record");

    let record = &batch[0];
    assert_eq!(record.key, Some(42));
    assert_eq!(record.offset, receipt.offset);
    assert_eq!(record.bindings, sent);
    assert_eq!(record.bindings.visibility(), "A&B");
    assert_eq!(
        record.bindings.get("x"),
        Some(&Term::identifier("urn:example:s"))
    );
    assert_eq!(
        record.bindings.get("y"),
        Some(&Term::typed_literal("42", "integer"))
    );

    reader.close().unwrap();
}

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn smoke_supervised_delivery_and_offset_resume() {
    init_tracing();
    let topic = unique_topic("bindflow-resume");
    ensure_topic(&brokers(), &topic, 1, 1).await.unwrap();

    let mut sink = ExportSink::from_bridge_config(&sink_config(&topic)).unwrap();
    sink.open().unwrap();

    // Publish three binding sets through the retry supervisor, using the
    // retry budget carried by the sink's own configuration.
    let supervisor = DeliverySupervisor::for_sink(sink);
    for i in 0..3 {
        let mut bindings = BindingSet::new();
        bindings.insert("n", Term::typed_literal(i.to_string(), "integer"));
        supervisor.deliver(i, bindings).await.unwrap();
    }

    // First session reads one record and commits its offset on close.
    let group = unique_topic("resume-group");
    let mut reader = IntakeReader::from_bridge_config(&reader_config(&topic, &group)).unwrap();
    reader.open().unwrap();
    let first = reader.poll_batch(1, Duration::from_secs(3)).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(reader.has_uncommitted_offsets());
    reader.close().unwrap();

    // Second session in the same group resumes past the committed record.
    let mut reader = IntakeReader::from_bridge_config(&reader_config(&topic, &group)).unwrap();
    reader.open().unwrap();
    let rest = reader.poll_batch(10, Duration::from_secs(3)).await.unwrap();
    assert_eq!(rest.len(), 2, "committed record must not be redelivered");
    assert!(rest.iter().all(|r| r.offset > first[0].offset));
    reader.close().unwrap();
}

#[tokio::test]
#[ignore = "requires a running Kafka broker"]
async fn smoke_malformed_payloads_are_skipped() {
    init_tracing();
    let topic = unique_topic("bindflow-skip");
    ensure_topic(&brokers(), &topic, 1, 1).await.unwrap();

    // Hand-produce one garbage payload and one valid one.
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    let producer: FutureProducer = rdkafka::ClientConfig::new()
        .set("bootstrap.servers", brokers())
        .create()
        .unwrap();
    producer
        .send(
            FutureRecord::<(), _>::to(&topic).payload(&b"\xffgarbage"[..]),
            Timeout::After(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    let mut sink = ExportSink::from_bridge_config(&sink_config(&topic)).unwrap();
    sink.open().unwrap();
    sink.export(&sample_bindings()).await.unwrap();
    sink.close().unwrap();

    let mut reader = IntakeReader::from_bridge_config(&reader_config(&topic, "skip-g0")).unwrap();
    reader.open().unwrap();
    let batch = reader.poll_batch(10, Duration::from_secs(3)).await.unwrap();

    assert_eq!(batch.len(), 1, "garbage message must be skipped");
    assert_eq!(batch[0].bindings, sample_bindings());

    let metrics = reader.metrics();
    assert_eq!(metrics.records_total, 1);
    assert_eq!(metrics.version_skipped_total, 1);

    reader.close().unwrap();
}

//! Intake reader configuration.
//!
//! [`IntakeConfig`] encapsulates the tuning knobs for the Kafka consumer,
//! parsed from a string-keyed [`BridgeConfig`].

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::ClientConfig;

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Deserializer identifier for the 4-byte big-endian message key.
pub const KEY_DESERIALIZER: &str = "integer";
/// Deserializer identifier for the binding-set wire format.
pub const VALUE_DESERIALIZER: &str = "binding-set";

/// Configuration for the intake reader.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Kafka broker addresses (comma-separated).
    pub bootstrap_servers: String,
    /// Topic to subscribe to.
    pub topic: String,
    /// Consumer group identity. Re-subscribing with the same group resumes
    /// from committed offsets.
    pub group_id: String,
    /// Consumer client identifier.
    pub client_id: Option<String>,
    /// Where a new consumer group starts in the topic's history.
    pub offset_reset: OffsetReset,
    /// Maximum records returned by one poll.
    pub max_poll_records: usize,
    /// How often the intake supervisor commits observed offsets.
    pub commit_interval: Duration,
    /// Additional rdkafka client properties (pass-through).
    pub kafka_properties: HashMap<String, String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: String::new(),
            topic: String::new(),
            group_id: String::new(),
            client_id: None,
            offset_reset: OffsetReset::Earliest,
            max_poll_records: 500,
            commit_interval: Duration::from_secs(5),
            kafka_properties: HashMap::new(),
        }
    }
}

impl IntakeConfig {
    /// Parses a reader config from a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MissingConfig`] if required keys are absent,
    /// or [`BridgeError::ConfigurationError`] on invalid values.
    #[allow(clippy::field_reassign_with_default)]
    pub fn from_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let mut cfg = Self::default();

        cfg.bootstrap_servers = config
            .get("bootstrap.servers")
            .ok_or_else(|| BridgeError::MissingConfig("bootstrap.servers".into()))?
            .to_string();

        cfg.topic = config
            .get("topic")
            .ok_or_else(|| BridgeError::MissingConfig("topic".into()))?
            .to_string();

        cfg.group_id = config
            .get("group.id")
            .ok_or_else(|| BridgeError::MissingConfig("group.id".into()))?
            .to_string();

        cfg.client_id = config.get("client.id").map(String::from);

        if let Some(r) = config.get("offset.reset") {
            cfg.offset_reset = r.parse()?;
        }

        if let Some(v) = config.get("max.poll.records") {
            cfg.max_poll_records = v.parse().map_err(|_| {
                BridgeError::ConfigurationError(format!("invalid max.poll.records: '{v}'"))
            })?;
        }

        if let Some(v) = config.get("commit.interval.ms") {
            let ms: u64 = v.parse().map_err(|_| {
                BridgeError::ConfigurationError(format!("invalid commit.interval.ms: '{v}'"))
            })?;
            cfg.commit_interval = Duration::from_millis(ms);
        }

        if let Some(k) = config.get("key.deserializer") {
            if k != KEY_DESERIALIZER {
                return Err(BridgeError::ConfigurationError(format!(
                    "unsupported key.deserializer: '{k}' (expected '{KEY_DESERIALIZER}')"
                )));
            }
        }
        if let Some(v) = config.get("value.deserializer") {
            if v != VALUE_DESERIALIZER {
                return Err(BridgeError::ConfigurationError(format!(
                    "unsupported value.deserializer: '{v}' (expected '{VALUE_DESERIALIZER}')"
                )));
            }
        }

        for (key, value) in config.properties_with_prefix("kafka.") {
            cfg.kafka_properties.insert(key, value);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::MissingConfig`] or
    /// [`BridgeError::ConfigurationError`] on invalid combinations.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.bootstrap_servers.is_empty() {
            return Err(BridgeError::MissingConfig("bootstrap.servers".into()));
        }
        if self.topic.is_empty() {
            return Err(BridgeError::MissingConfig("topic".into()));
        }
        if self.group_id.is_empty() {
            return Err(BridgeError::MissingConfig("group.id".into()));
        }
        if self.max_poll_records == 0 {
            return Err(BridgeError::ConfigurationError(
                "max.poll.records must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Builds an rdkafka [`ClientConfig`] from this configuration.
    ///
    /// Auto-commit is always disabled; offsets are committed explicitly by
    /// the intake supervisor after batches reach the caller.
    #[must_use]
    pub fn to_rdkafka_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", self.offset_reset.as_rdkafka_str())
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");

        if let Some(ref client_id) = self.client_id {
            config.set("client.id", client_id);
        }

        for (key, value) in &self.kafka_properties {
            config.set(key, value);
        }

        config
    }
}

/// Where a new consumer group starts in a topic's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    /// Start from the beginning of the topic: every message produced since
    /// topic creation is observed, even when subscribing late.
    Earliest,
    /// Start from the end: only messages produced after subscribing.
    Latest,
}

impl OffsetReset {
    /// Returns the rdkafka configuration string.
    #[must_use]
    pub fn as_rdkafka_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

str_enum!(OffsetReset, BridgeError, "unknown offset reset policy",
    Earliest => "earliest";
    Latest => "latest"
);

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(pairs: &[(&str, &str)]) -> BridgeConfig {
        let mut config = BridgeConfig::new("intake");
        for (k, v) in pairs {
            config.set(*k, *v);
        }
        config
    }

    fn required_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("bootstrap.servers", "localhost:9092"),
            ("topic", "query-results"),
            ("group.id", "group0"),
        ]
    }

    #[test]
    fn test_parse_required_fields() {
        let cfg = IntakeConfig::from_config(&make_config(&required_pairs())).unwrap();
        assert_eq!(cfg.bootstrap_servers, "localhost:9092");
        assert_eq!(cfg.topic, "query-results");
        assert_eq!(cfg.group_id, "group0");
        assert_eq!(cfg.offset_reset, OffsetReset::Earliest);
        assert_eq!(cfg.max_poll_records, 500);
    }

    #[test]
    fn test_missing_group_id() {
        let result = IntakeConfig::from_config(&make_config(&[
            ("bootstrap.servers", "b:9092"),
            ("topic", "t"),
        ]));
        assert!(matches!(result, Err(BridgeError::MissingConfig(_))));
    }

    #[test]
    fn test_parse_optional_fields() {
        let mut pairs = required_pairs();
        pairs.extend_from_slice(&[
            ("client.id", "consumer0"),
            ("offset.reset", "latest"),
            ("max.poll.records", "64"),
            ("commit.interval.ms", "1000"),
            ("key.deserializer", "integer"),
            ("value.deserializer", "binding-set"),
        ]);
        let cfg = IntakeConfig::from_config(&make_config(&pairs)).unwrap();

        assert_eq!(cfg.client_id.as_deref(), Some("consumer0"));
        assert_eq!(cfg.offset_reset, OffsetReset::Latest);
        assert_eq!(cfg.max_poll_records, 64);
        assert_eq!(cfg.commit_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_invalid_offset_reset() {
        let mut pairs = required_pairs();
        pairs.push(("offset.reset", "newest"));
        let result = IntakeConfig::from_config(&make_config(&pairs));
        assert!(matches!(result, Err(BridgeError::ConfigurationError(_))));
    }

    #[test]
    fn test_zero_max_poll_records_rejected() {
        let mut pairs = required_pairs();
        pairs.push(("max.poll.records", "0"));
        assert!(IntakeConfig::from_config(&make_config(&pairs)).is_err());
    }

    #[test]
    fn test_unsupported_deserializer_rejected() {
        let mut pairs = required_pairs();
        pairs.push(("value.deserializer", "avro"));
        assert!(IntakeConfig::from_config(&make_config(&pairs)).is_err());
    }

    #[test]
    fn test_rdkafka_config_disables_auto_commit() {
        let mut pairs = required_pairs();
        pairs.push(("kafka.session.timeout.ms", "6000"));
        let cfg = IntakeConfig::from_config(&make_config(&pairs)).unwrap();
        let rdk = cfg.to_rdkafka_config();

        assert_eq!(rdk.get("enable.auto.commit"), Some("false"));
        assert_eq!(rdk.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(rdk.get("group.id"), Some("group0"));
        assert_eq!(rdk.get("session.timeout.ms"), Some("6000"));
    }

    #[test]
    fn test_offset_reset_parse_and_display() {
        assert_eq!(
            "earliest".parse::<OffsetReset>().unwrap(),
            OffsetReset::Earliest
        );
        assert_eq!("latest".parse::<OffsetReset>().unwrap(), OffsetReset::Latest);
        assert_eq!(OffsetReset::Earliest.to_string(), "earliest");
        assert!("newest".parse::<OffsetReset>().is_err());
    }
}

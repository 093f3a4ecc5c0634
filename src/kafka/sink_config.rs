//! Export sink configuration.
//!
//! [`ExportConfig`] encapsulates the tuning knobs for the Kafka producer,
//! parsed from a string-keyed [`BridgeConfig`].

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::ClientConfig;
use xxhash_rust::xxh3::Xxh3;

use crate::binding::BindingSet;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::supervisor::RetryPolicy;
use crate::term::Term;

/// Serializer identifier for the 4-byte big-endian message key.
pub const KEY_SERIALIZER: &str = "integer";
/// Serializer identifier for the binding-set wire format.
pub const VALUE_SERIALIZER: &str = "binding-set";

/// Configuration for the export sink.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Kafka broker addresses (comma-separated).
    pub bootstrap_servers: String,
    /// Destination topic name.
    pub topic: String,
    /// Producer client identifier.
    pub client_id: Option<String>,
    /// Acknowledgment level. Default favors at-least-once over latency.
    pub acks: Acks,
    /// Maximum time to wait for delivery confirmation.
    pub delivery_timeout: Duration,
    /// Maximum time to wait before sending a batch (milliseconds).
    pub linger_ms: u64,
    /// Retry/backoff budget applied by the delivery supervisor.
    pub retry: RetryPolicy,
    /// How the partition key is derived for pushed binding sets.
    pub key_policy: KeyPolicy,
    /// Additional rdkafka client properties (pass-through).
    pub kafka_properties: HashMap<String, String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: String::new(),
            topic: String::new(),
            client_id: None,
            acks: Acks::All,
            delivery_timeout: Duration::from_secs(30),
            linger_ms: 5,
            retry: RetryPolicy::default(),
            key_policy: KeyPolicy::BindingHash,
            kafka_properties: HashMap::new(),
        }
    }
}

impl ExportConfig {
    /// Parses a sink config from a [`BridgeConfig`].
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

        cfg.client_id = config.get("client.id").map(String::from);

        if let Some(a) = config.get("acks") {
            cfg.acks = a.parse().map_err(|_| {
                BridgeError::ConfigurationError(format!(
                    "invalid acks: '{a}' (expected 'all', '1', or '0')"
                ))
            })?;
        }

        if let Some(v) = config.get("delivery.timeout.ms") {
            cfg.delivery_timeout = Duration::from_millis(parse_u64(v, "delivery.timeout.ms")?);
        }

        if let Some(v) = config.get("linger.ms") {
            cfg.linger_ms = parse_u64(v, "linger.ms")?;
        }

        if let Some(v) = config.get("retry.max") {
            cfg.retry.max_retries = v.parse().map_err(|_| {
                BridgeError::ConfigurationError(format!("invalid retry.max: '{v}'"))
            })?;
        }

        if let Some(v) = config.get("retry.backoff.ms") {
            cfg.retry.initial_backoff = Duration::from_millis(parse_u64(v, "retry.backoff.ms")?);
        }

        if let Some(v) = config.get("retry.backoff.max.ms") {
            cfg.retry.max_backoff = Duration::from_millis(parse_u64(v, "retry.backoff.max.ms")?);
        }

        cfg.key_policy = KeyPolicy::from_config(config)?;

        // The serializer identifiers are fixed for result export; reject
        // anything else so a miswired pipeline fails fast.
        if let Some(k) = config.get("key.serializer") {
            if k != KEY_SERIALIZER {
                return Err(BridgeError::ConfigurationError(format!(
                    "unsupported key.serializer: '{k}' (expected '{KEY_SERIALIZER}')"
                )));
            }
        }
        if let Some(v) = config.get("value.serializer") {
            if v != VALUE_SERIALIZER {
                return Err(BridgeError::ConfigurationError(format!(
                    "unsupported value.serializer: '{v}' (expected '{VALUE_SERIALIZER}')"
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
        if self.delivery_timeout.is_zero() {
            return Err(BridgeError::ConfigurationError(
                "delivery.timeout.ms must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Builds an rdkafka [`ClientConfig`] from this configuration.
    ///
    /// Idempotence is enabled when `acks` is `all`, matching the
    /// at-least-once default.
    #[must_use]
    pub fn to_rdkafka_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("acks", self.acks.as_rdkafka_str())
            .set("linger.ms", self.linger_ms.to_string())
            .set(
                "message.timeout.ms",
                self.delivery_timeout.as_millis().to_string(),
            );

        if self.acks == Acks::All {
            config.set("enable.idempotence", "true");
        }

        if let Some(ref client_id) = self.client_id {
            config.set("client.id", client_id);
        }

        // Pass-through properties can override any of the above.
        for (key, value) in &self.kafka_properties {
            config.set(key, value);
        }

        config
    }
}

fn parse_u64(value: &str, key: &str) -> Result<u64, BridgeError> {
    value
        .parse()
        .map_err(|_| BridgeError::ConfigurationError(format!("invalid {key}: '{value}'")))
}

/// Acknowledgment level for the Kafka producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acks {
    /// No acknowledgment (fire-and-forget).
    None,
    /// Leader acknowledgment only.
    Leader,
    /// All in-sync replica acknowledgment.
    All,
}

impl Acks {
    /// Returns the rdkafka configuration string.
    #[must_use]
    pub fn as_rdkafka_str(&self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Leader => "1",
            Self::All => "all",
        }
    }
}

str_enum!(fromstr Acks, String, "unknown acks value",
    None => "0", "none";
    Leader => "1", "leader";
    All => "-1", "all"
);

impl std::fmt::Display for Acks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_rdkafka_str())
    }
}

/// How the partition key is derived for a pushed binding set.
///
/// Only the derivation is configurable; no particular partitioning scheme
/// is assumed beyond "same key, same partition".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Every message uses the same fixed key (single-partition pipelines
    /// and test harnesses).
    Fixed(i32),
    /// Key is an xxh3 hash over the binding set's pairs and visibility
    /// label. xxh3 output is specified, so identical results land on the
    /// same partition regardless of which producer build sent them.
    BindingHash,
}

impl KeyPolicy {
    /// Parses the policy from `partition.key.policy` /
    /// `partition.key.value`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigurationError`] on an unknown policy or
    /// a non-integer fixed key value.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        match config.get("partition.key.policy") {
            None => Ok(Self::BindingHash),
            Some("binding-hash") => Ok(Self::BindingHash),
            Some("fixed") => {
                let value = match config.get("partition.key.value") {
                    None => 0,
                    Some(raw) => raw.parse().map_err(|_| {
                        BridgeError::ConfigurationError(format!(
                            "invalid partition.key.value: '{raw}'"
                        ))
                    })?,
                };
                Ok(Self::Fixed(value))
            }
            Some(other) => Err(BridgeError::ConfigurationError(format!(
                "unknown partition.key.policy: '{other}' (expected 'fixed' or 'binding-hash')"
            ))),
        }
    }

    /// Derives the partition key for one binding set.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn derive(&self, bindings: &BindingSet) -> i32 {
        match self {
            Self::Fixed(key) => *key,
            Self::BindingHash => {
                let mut hasher = Xxh3::new();
                for (name, term) in bindings {
                    hash_component(&mut hasher, name.as_bytes());
                    match term {
                        Term::Identifier(value) => {
                            hasher.update(&[0x01]);
                            hash_component(&mut hasher, value.as_bytes());
                        }
                        Term::Literal {
                            value,
                            datatype,
                            language,
                        } => {
                            hasher.update(&[0x02]);
                            hash_component(&mut hasher, value.as_bytes());
                            hash_optional(&mut hasher, datatype.as_deref());
                            hash_optional(&mut hasher, language.as_deref());
                        }
                        Term::AnonymousNode(label) => {
                            hasher.update(&[0x03]);
                            hash_component(&mut hasher, label.as_bytes());
                        }
                    }
                }
                hash_component(&mut hasher, bindings.visibility().as_bytes());
                // Mask to a non-negative i32.
                (hasher.digest() & 0x7fff_ffff) as i32
            }
        }
    }
}

/// Feeds one length-prefixed component, so adjacent strings cannot collide
/// by sliding bytes across their boundary.
fn hash_component(hasher: &mut Xxh3, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    hasher.update(&len.to_le_bytes());
    hasher.update(bytes);
}

fn hash_optional(hasher: &mut Xxh3, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(&[1]);
            hash_component(hasher, v.as_bytes());
        }
        None => hasher.update(&[0]),
    }
}

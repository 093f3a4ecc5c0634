//! String-keyed bridge configuration.
//!
//! [`BridgeConfig`] is the untyped option map handed to sink and reader
//! constructors. Typed configuration structs (`ExportConfig`,
//! `IntakeConfig`) parse themselves out of it with `from_config`.
//! There is no process-wide mutable state: each sink or reader instance
//! owns the configuration it was constructed with.

use std::collections::HashMap;

/// A string-keyed configuration map for one bridge endpoint.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Endpoint name, used for log context (e.g. `"export"`, `"intake"`).
    name: String,
    /// Raw key/value option pairs.
    properties: HashMap<String, String>,
}

impl BridgeConfig {
    /// Creates an empty configuration for the named endpoint.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    /// Returns the endpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets an option, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the value for a key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns the raw option map.
    #[must_use]
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Returns all options whose key starts with `prefix`, with the prefix
    /// stripped. Used for `kafka.`-prefixed pass-through properties.
    #[must_use]
    pub fn properties_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.properties
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(prefix)
                    .map(|stripped| (stripped.to_string(), v.clone()))
            })
            .collect()
    }
}

/// Lifecycle state of a sink or reader instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Constructed but not yet connected.
    Created,
    /// Connected to the broker and operational.
    Running,
    /// Cleanly shut down; the broker connection has been released.
    Closed,
    /// Unrecoverably failed.
    Failed,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Closed => "Closed",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

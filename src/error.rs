//! Error types for the export bridge.
//!
//! Provides [`BridgeError`], the single error taxonomy shared by the codec,
//! the Kafka sink/reader, and the delivery supervisor, plus a convenience
//! [`BridgeResult`] alias.

use thiserror::Error;

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while encoding, publishing, or consuming
/// binding sets.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The encoder hit an internal invariant violation. Indicates a
    /// producer-side bug; never retried.
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    /// A consumed payload does not match the expected tagged format
    /// (truncated, bad tag, inconsistent lengths). Skipped on the consume
    /// side; never terminates the stream.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload's version byte is not one this decoder understands.
    /// Reported distinctly from [`BridgeError::MalformedPayload`] so a
    /// rollout mismatch can be told apart from data corruption.
    #[error("unsupported payload version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version byte found in the payload.
        found: u8,
        /// Version this decoder implements.
        expected: u8,
    },

    /// The broker is unreachable or rejected the operation transiently.
    /// Retried with backoff by the delivery supervisor.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// A required configuration key is missing. Fails fast at startup.
    #[error("missing config: {0}")]
    MissingConfig(String),

    /// A configuration value is invalid. Fails fast at startup.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// An operation was called in the wrong lifecycle state.
    #[error("invalid state: expected {expected}, actual {actual}")]
    InvalidState {
        /// The state the operation requires.
        expected: String,
        /// The state the component was in.
        actual: String,
    },
}

impl BridgeError {
    /// Returns whether the error is transient and worth retrying.
    ///
    /// Only transport-level outages qualify; everything else is either a
    /// local bug, bad data, or bad configuration.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportUnavailable(_))
    }
}

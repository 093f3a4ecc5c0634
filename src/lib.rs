//! # Bindflow
//!
//! A bridge that carries incrementally derived query-result tuples (binding
//! sets) out of a continuous dataflow engine and into a Kafka topic, and back
//! out of Kafka into consumer code.
//!
//! The crate has four moving parts:
//!
//! - [`codec`] — the binary wire format for a [`BindingSet`]. Round-trips
//!   exactly across independent producer and consumer implementations.
//! - [`kafka::ExportSink`] — encodes each newly derived binding set and
//!   appends it to a Kafka topic.
//! - [`kafka::IntakeReader`] — subscribes to a topic and yields decoded
//!   binding sets, skipping (and logging) malformed messages.
//! - [`supervisor`] — wraps publishing with a retry/backoff state machine and
//!   the reader's poll loop with an offset-commit policy.
//!
//! Delivery is at-least-once: the sink waits for broker acknowledgment, the
//! reader commits offsets only after a batch has been handed to the caller.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

#[macro_use]
mod macros;

pub mod binding;
pub mod codec;
pub mod config;
pub mod error;
pub mod kafka;
pub mod supervisor;
pub mod term;

pub use binding::BindingSet;
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use term::{Term, TermKind};

//! Delivery supervision: retry/backoff around publishing, offset-commit
//! policy around the intake poll loop.
//!
//! The supervisor governs both ends' interaction with the broker but never
//! inspects tuple contents. Each published message gets its own
//! [`DeliveryTracker`] (state machine) and [`RetrySchedule`] (backoff
//! state); nothing is shared across in-flight messages.
//!
//! State machine per message:
//!
//! ```text
//! Pending → Sent → Acknowledged                    (terminal success)
//! Pending → Sent → Retrying → Sent → … → Failed    (terminal failure)
//! ```
//!
//! No transition skips `Sent`. On `Failed` the original binding set and
//! the final error are surfaced to the caller as a [`FailedDelivery`];
//! the supervisor never drops a message silently.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::binding::BindingSet;
use crate::error::BridgeError;
use crate::kafka::ExportSink;
use crate::kafka::IntakeReader;
use crate::kafka::IntakeRecord;

/// Broker acknowledgment for one published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Topic the message was appended to.
    pub topic: String,
    /// Partition the message landed on.
    pub partition: i32,
    /// Offset assigned by the broker.
    pub offset: i64,
}

/// The seam between the supervisor and the transport: anything that can
/// publish one binding set and resolve to a broker acknowledgment.
///
/// `ExportSink` implements this; tests substitute mocks.
#[async_trait]
pub trait ResultPublisher: Send + Sync {
    /// Publishes one binding set under the given partition key.
    async fn publish(&self, key: i32, bindings: &BindingSet)
        -> Result<DeliveryReceipt, BridgeError>;
}

// ── Delivery state machine ──────────────────────────────────────────

/// Lifecycle of one supervised message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Accepted by the supervisor, not yet handed to the transport.
    Pending,
    /// Handed to the transport, awaiting acknowledgment.
    Sent,
    /// A transient failure occurred; waiting out the backoff.
    Retrying,
    /// Broker acknowledged the append. Terminal.
    Acknowledged,
    /// Retry budget exhausted or the error was not retryable. Terminal.
    Failed,
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Sent => "Sent",
            Self::Retrying => "Retrying",
            Self::Acknowledged => "Acknowledged",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Enforces legal [`DeliveryState`] transitions for one message and counts
/// send attempts.
#[derive(Debug)]
pub struct DeliveryTracker {
    state: DeliveryState,
    attempts: u32,
}

impl Default for DeliveryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryTracker {
    /// Creates a tracker in `Pending`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: DeliveryState::Pending,
            attempts: 0,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Returns how many times the message has been handed to the transport.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `Pending → Sent` or `Retrying → Sent` (backoff elapsed). Counts an
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] from any other state.
    pub fn sent(&mut self) -> Result<(), BridgeError> {
        self.transition(
            matches!(self.state, DeliveryState::Pending | DeliveryState::Retrying),
            DeliveryState::Sent,
            "Pending or Retrying",
        )?;
        self.attempts += 1;
        Ok(())
    }

    /// `Sent → Acknowledged`. Terminal success.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] from any other state.
    pub fn acknowledged(&mut self) -> Result<(), BridgeError> {
        self.transition(
            self.state == DeliveryState::Sent,
            DeliveryState::Acknowledged,
            "Sent",
        )
    }

    /// `Sent → Retrying` on a transport-level transient error.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] from any other state.
    pub fn retrying(&mut self) -> Result<(), BridgeError> {
        self.transition(
            self.state == DeliveryState::Sent,
            DeliveryState::Retrying,
            "Sent",
        )
    }

    /// `Retrying → Failed` (budget exhausted) or `Sent → Failed` (error
    /// that is not retried, e.g. an encoding failure). Terminal.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidState`] from any other state.
    pub fn failed(&mut self) -> Result<(), BridgeError> {
        self.transition(
            matches!(self.state, DeliveryState::Sent | DeliveryState::Retrying),
            DeliveryState::Failed,
            "Sent or Retrying",
        )
    }

    fn transition(
        &mut self,
        legal: bool,
        next: DeliveryState,
        expected: &str,
    ) -> Result<(), BridgeError> {
        if legal {
            self.state = next;
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                expected: expected.into(),
                actual: self.state.to_string(),
            })
        }
    }
}

// ── Retry policy ────────────────────────────────────────────────────

/// Retry/backoff configuration for supervised publishing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. 0 disables retries.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on the backoff delay.
    pub max_backoff: Duration,
    /// Multiplier applied to the delay after each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Starts a fresh per-message schedule. Backoff state is owned per
    /// in-flight message and never shared.
    #[must_use]
    pub fn schedule(&self) -> RetrySchedule {
        RetrySchedule {
            remaining: self.max_retries,
            current: self.initial_backoff,
            max: self.max_backoff,
            multiplier: self.multiplier,
        }
    }
}

/// Per-message exponential backoff state.
#[derive(Debug)]
pub struct RetrySchedule {
    remaining: u32,
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl RetrySchedule {
    /// Returns the delay to wait before the next attempt, or `None` when
    /// the retry budget is exhausted.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.current;
        let next_ms = (self.current.as_millis() as f64 * self.multiplier) as u64;
        self.current = Duration::from_millis(next_ms).min(self.max);
        Some(delay)
    }

    /// Returns how many retries remain in the budget.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

// ── Export supervision ──────────────────────────────────────────────

/// Terminal failure of a supervised delivery. Carries the original binding
/// set so the caller can decide whether to re-derive or re-publish.
#[derive(Debug, Error)]
#[error("delivery failed after {attempts} attempt(s): {error}")]
pub struct FailedDelivery {
    /// The binding set that could not be delivered.
    pub bindings: BindingSet,
    /// How many times the transport was tried.
    pub attempts: u32,
    /// The final error.
    pub error: BridgeError,
}

/// Wraps a [`ResultPublisher`] with the per-message retry state machine.
#[derive(Debug)]
pub struct DeliverySupervisor<P> {
    publisher: P,
    policy: RetryPolicy,
}

impl<P: ResultPublisher> DeliverySupervisor<P> {
    /// Creates a supervisor around the given publisher.
    #[must_use]
    pub fn new(publisher: P, policy: RetryPolicy) -> Self {
        Self { publisher, policy }
    }

    /// Returns the wrapped publisher.
    #[must_use]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Returns the retry policy in force.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Publishes one binding set, retrying transient transport failures
    /// with exponential backoff up to the policy's budget.
    ///
    /// # Errors
    ///
    /// Returns [`FailedDelivery`] carrying the binding set, the attempt
    /// count, and the final error once the budget is exhausted or when the
    /// error is not retryable (encoding failures indicate a producer-side
    /// bug and are surfaced immediately).
    pub async fn deliver(
        &self,
        key: i32,
        bindings: BindingSet,
    ) -> Result<DeliveryReceipt, FailedDelivery> {
        let mut tracker = DeliveryTracker::new();
        let mut schedule = self.policy.schedule();

        loop {
            if let Err(error) = tracker.sent() {
                return Err(FailedDelivery {
                    attempts: tracker.attempts(),
                    bindings,
                    error,
                });
            }

            match self.publisher.publish(key, &bindings).await {
                Ok(receipt) => {
                    if let Err(error) = tracker.acknowledged() {
                        return Err(FailedDelivery {
                            attempts: tracker.attempts(),
                            bindings,
                            error,
                        });
                    }
                    debug!(
                        partition = receipt.partition,
                        offset = receipt.offset,
                        attempts = tracker.attempts(),
                        "delivery acknowledged"
                    );
                    return Ok(receipt);
                }
                Err(error) if error.is_transient() => {
                    if let Err(error) = tracker.retrying() {
                        return Err(FailedDelivery {
                            attempts: tracker.attempts(),
                            bindings,
                            error,
                        });
                    }
                    if let Some(delay) = schedule.next_backoff() {
                        warn!(
                            attempt = tracker.attempts(),
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %error,
                            "transient publish failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        if let Err(error) = tracker.failed() {
                            return Err(FailedDelivery {
                                attempts: tracker.attempts(),
                                bindings,
                                error,
                            });
                        }
                        warn!(
                            attempts = tracker.attempts(),
                            error = %error,
                            "retry budget exhausted, surfacing failure"
                        );
                        return Err(FailedDelivery {
                            attempts: tracker.attempts(),
                            bindings,
                            error,
                        });
                    }
                }
                Err(error) => {
                    if let Err(error) = tracker.failed() {
                        return Err(FailedDelivery {
                            attempts: tracker.attempts(),
                            bindings,
                            error,
                        });
                    }
                    return Err(FailedDelivery {
                        attempts: tracker.attempts(),
                        bindings,
                        error,
                    });
                }
            }
        }
    }
}

impl DeliverySupervisor<ExportSink> {
    /// Creates a supervisor around an export sink using the retry budget
    /// parsed into the sink's configuration (`retry.max`,
    /// `retry.backoff.ms`, `retry.backoff.max.ms`).
    #[must_use]
    pub fn for_sink(sink: ExportSink) -> Self {
        let policy = sink.config().retry.clone();
        Self::new(sink, policy)
    }
}

// ── Intake supervision ──────────────────────────────────────────────

/// Wraps an [`IntakeReader`]'s poll loop with an offset-commit policy:
/// observed offsets are committed once per interval, after batches have
/// been handed to the caller (at-least-once).
#[derive(Debug)]
pub struct IntakeSupervisor {
    commit_interval: Duration,
    last_commit: std::time::Instant,
}

impl IntakeSupervisor {
    /// Creates a supervisor committing at most once per `commit_interval`.
    #[must_use]
    pub fn new(commit_interval: Duration) -> Self {
        Self {
            commit_interval,
            last_commit: std::time::Instant::now(),
        }
    }

    /// Returns whether a commit is due.
    #[must_use]
    pub fn commit_due(&self) -> bool {
        self.last_commit.elapsed() >= self.commit_interval
    }

    /// Polls one batch from the reader and commits observed offsets when
    /// the commit interval has elapsed.
    ///
    /// # Errors
    ///
    /// Propagates reader errors. Commit failures are logged and retried on
    /// the next due interval rather than failing the poll (the batch has
    /// already been read; a missed commit only widens the redelivery
    /// window, it never loses data).
    pub async fn poll(
        &mut self,
        reader: &mut IntakeReader,
        max_records: usize,
        timeout: Duration,
    ) -> Result<Vec<IntakeRecord>, BridgeError> {
        let batch = reader.poll_batch(max_records, timeout).await?;

        if self.commit_due() && reader.has_uncommitted_offsets() {
            match reader.commit() {
                Ok(()) => self.last_commit = std::time::Instant::now(),
                Err(e) => warn!(error = %e, "offset commit failed, will retry"),
            }
        }

        Ok(batch)
    }
}

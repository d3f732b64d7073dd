//! Error taxonomy for the condition engine.
//!
//! Configuration problems are rejected loudly at registration time. Injected
//! failures and downstream forward failures are *not* errors from the
//! caller's point of view: both surface as ordinary responses (see
//! [`crate::response::ResponseOrigin`]). Only engine-internal faults abort a
//! request, and telemetry failures never leave the emitter.

use std::{error::Error as StdError, io};

use thiserror::Error;

/// Boxed error produced by a downstream service.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Rejection of a malformed pattern or out-of-range profile value.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    /// The route pattern was empty.
    #[error("route pattern must not be empty")]
    EmptyPattern,
    /// The route pattern contained a run of more than two `*` characters.
    #[error("route pattern {pattern:?} contains an ambiguous wildcard run at byte {offset}")]
    WildcardRun {
        /// Offending pattern.
        pattern: String,
        /// Byte offset where the run starts.
        offset: usize,
    },
    /// The route pattern contained a character that can never match a request path.
    #[error("route pattern {pattern:?} contains unsupported character {found:?}")]
    UnsupportedCharacter {
        /// Offending pattern.
        pattern: String,
        /// The unsupported character.
        found: char,
    },
    /// The profile name was empty.
    #[error("condition profile name must not be empty")]
    EmptyName,
    /// A failure rate was outside `[0, 1]` or not finite.
    #[error("failure rate {0} is outside [0, 1]")]
    FailureRate(f64),
    /// The jitter range was inverted.
    #[error("jitter range [{min_ms}, {max_ms}] ms is inverted")]
    JitterInverted {
        /// Lower jitter bound.
        min_ms: i64,
        /// Upper jitter bound.
        max_ms: i64,
    },
    /// `base_delay + jitter.min` would be negative.
    #[error("base delay {base_ms} ms with jitter minimum {min_ms} ms yields a negative delay")]
    NegativeDelay {
        /// Base delay in milliseconds.
        base_ms: u64,
        /// Lower jitter bound.
        min_ms: i64,
    },
    /// The failure status was not a valid HTTP status code.
    #[error("failure status {0} is not a valid HTTP status code")]
    Status(u16),
    /// The peak window bounds were invalid.
    #[error("peak window {start_hour}..{end_hour} is invalid; hours must be 0..=24 and differ")]
    PeakWindow {
        /// Inclusive starting hour.
        start_hour: u8,
        /// Exclusive ending hour.
        end_hour: u8,
    },
    /// No preset is registered under the given name.
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
    /// No scenario bundle is registered under the given name.
    #[error("unknown scenario {0:?}")]
    UnknownScenario(String),
}

/// The real downstream call failed on its own.
///
/// Distinct from an injected failure: the engine did not choose this outcome.
#[derive(Debug, Error)]
#[error("forwarding to upstream failed: {source}")]
pub struct ForwardError {
    #[source]
    source: BoxError,
}

impl ForwardError {
    /// Wrap an upstream error.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Borrow the underlying upstream error.
    #[must_use]
    pub fn upstream(&self) -> &(dyn StdError + Send + Sync + 'static) { self.source.as_ref() }
}

/// Engine-internal fault that aborts the request entirely.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// A custom route handler panicked while deciding the request.
    #[error("route handler for {pattern:?} panicked: {message}")]
    HandlerPanicked {
        /// Pattern the handler was registered under.
        pattern: String,
        /// Formatted panic payload.
        message: String,
    },
    /// A custom route handler asked for the request to be aborted.
    #[error("route handler for {pattern:?} aborted the request: {reason}")]
    HandlerAborted {
        /// Pattern the handler was registered under.
        pattern: String,
        /// Reason supplied by the handler.
        reason: String,
    },
}

/// Failure to deliver a measurement to the telemetry sink.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The sink could not be reached.
    #[error("telemetry sink unreachable: {0}")]
    Io(#[from] io::Error),
    /// The sink rejected the measurement.
    #[error("telemetry sink rejected measurement: {0}")]
    Rejected(String),
}

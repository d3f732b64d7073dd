//! Condition profiles describing a synthetic degradation.
//!
//! A [`ConditionProfile`] is immutable once built. Every value is validated by
//! [`ProfileBuilder::build`]; nothing is clamped silently.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{NaiveTime, Timelike};

use crate::{entropy::Entropy, error::ConfigurationError};

/// Status used for injected failures unless a profile overrides it.
pub const DEFAULT_FAILURE_STATUS: u16 = 503;
/// Body used for injected failures unless a profile overrides it.
pub const DEFAULT_FAILURE_BODY: &str = r#"{"error":"Network unavailable"}"#;

/// Additional random delay in milliseconds, inclusive at both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct JitterRange {
    min_ms: i64,
    max_ms: i64,
}

impl JitterRange {
    /// Lower bound; may be negative.
    #[must_use]
    pub const fn min_ms(&self) -> i64 { self.min_ms }

    /// Upper bound.
    #[must_use]
    pub const fn max_ms(&self) -> i64 { self.max_ms }
}

/// Status and body returned when a failure is injected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureResponse {
    status: u16,
    body: Bytes,
}

impl FailureResponse {
    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 { self.status }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }
}

impl Default for FailureResponse {
    fn default() -> Self {
        Self {
            status: DEFAULT_FAILURE_STATUS,
            body: Bytes::from_static(DEFAULT_FAILURE_BODY.as_bytes()),
        }
    }
}

/// Hour-of-day range `[start_hour, end_hour)` in local time.
///
/// A window whose start is after its end wraps past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeakWindow {
    start_hour: u8,
    end_hour: u8,
}

impl PeakWindow {
    /// Build a window, validating its bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::PeakWindow`] if either hour exceeds 24,
    /// the start is 24, or both bounds are equal.
    pub fn new(start_hour: u8, end_hour: u8) -> Result<Self, ConfigurationError> {
        if start_hour >= 24 || end_hour > 24 || start_hour == end_hour {
            return Err(ConfigurationError::PeakWindow {
                start_hour,
                end_hour,
            });
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    /// Inclusive starting hour.
    #[must_use]
    pub const fn start_hour(&self) -> u8 { self.start_hour }

    /// Exclusive ending hour.
    #[must_use]
    pub const fn end_hour(&self) -> u8 { self.end_hour }

    /// Whether `time` falls inside the window.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        let hour = time.hour();
        let (start, end) = (u32::from(self.start_hour), u32::from(self.end_hour));
        if start < end {
            (start..end).contains(&hour)
        } else {
            hour >= start || hour < end
        }
    }
}

/// Elevated failure rate applied inside a [`PeakWindow`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakFailure {
    window: PeakWindow,
    failure_rate: f64,
}

impl PeakFailure {
    /// Window during which the elevated rate applies.
    #[must_use]
    pub const fn window(&self) -> PeakWindow { self.window }

    /// Failure rate inside the window.
    #[must_use]
    pub const fn failure_rate(&self) -> f64 { self.failure_rate }
}

/// Immutable description of a synthetic degradation.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionProfile {
    name: Arc<str>,
    base_delay: Duration,
    jitter: JitterRange,
    failure_rate: f64,
    peak: Option<PeakFailure>,
    failure_response: FailureResponse,
}

impl ConditionProfile {
    /// Start building a profile identified by `name` in logs and telemetry.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ProfileBuilder { ProfileBuilder::new(name) }

    /// Identifier used in logs and telemetry.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Minimum guaranteed latency before jitter.
    #[must_use]
    pub const fn base_delay(&self) -> Duration { self.base_delay }

    /// Random jitter added to the base delay.
    #[must_use]
    pub const fn jitter(&self) -> JitterRange { self.jitter }

    /// Failure rate outside any peak window.
    #[must_use]
    pub const fn failure_rate(&self) -> f64 { self.failure_rate }

    /// Elevated failure rate, if the profile has a peak window.
    #[must_use]
    pub const fn peak(&self) -> Option<PeakFailure> { self.peak }

    /// Response substituted when a failure is injected.
    #[must_use]
    pub fn failure_response(&self) -> &FailureResponse { &self.failure_response }

    /// Smallest and largest delay the profile can produce.
    #[must_use]
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        (
            self.offset_base(self.jitter.min_ms),
            self.offset_base(self.jitter.max_ms),
        )
    }

    /// Midpoint of [`Self::delay_bounds`].
    #[must_use]
    pub fn mean_delay(&self) -> Duration {
        let (low, high) = self.delay_bounds();
        (low + high) / 2
    }

    /// Draw `base_delay + uniform(jitter.min, jitter.max)`, clamped at zero.
    pub fn sample_delay(&self, entropy: &Entropy) -> Duration {
        self.offset_base(entropy.uniform_ms(self.jitter.min_ms, self.jitter.max_ms))
    }

    /// Failure rate in force at `time`.
    #[must_use]
    pub fn failure_rate_at(&self, time: NaiveTime) -> f64 {
        match self.peak {
            Some(peak) if peak.window.contains(time) => peak.failure_rate,
            _ => self.failure_rate,
        }
    }

    fn offset_base(&self, offset_ms: i64) -> Duration {
        let base = i64::try_from(self.base_delay.as_millis()).unwrap_or(i64::MAX);
        let total = base.saturating_add(offset_ms).max(0);
        Duration::from_millis(total.unsigned_abs())
    }
}

/// Validating builder for [`ConditionProfile`].
///
/// ```
/// use netcondition::profile::ConditionProfile;
///
/// let profile = ConditionProfile::builder("3g")
///     .base_delay_ms(1_500)
///     .jitter_ms(0, 800)
///     .failure_rate(0.12)
///     .build()
///     .expect("valid profile");
/// assert_eq!(profile.failure_response().status(), 503);
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct ProfileBuilder {
    name: String,
    base_delay_ms: u64,
    jitter_min_ms: i64,
    jitter_max_ms: i64,
    failure_rate: f64,
    peak: Option<(u8, u8, f64)>,
    failure_status: u16,
    failure_body: Bytes,
}

impl ProfileBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_delay_ms: 0,
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            failure_rate: 0.0,
            peak: None,
            failure_status: DEFAULT_FAILURE_STATUS,
            failure_body: Bytes::from_static(DEFAULT_FAILURE_BODY.as_bytes()),
        }
    }

    /// Replace the profile name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the base delay in milliseconds.
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Set the jitter range in milliseconds.
    pub fn jitter_ms(mut self, min_ms: i64, max_ms: i64) -> Self {
        self.jitter_min_ms = min_ms;
        self.jitter_max_ms = max_ms;
        self
    }

    /// Set the failure rate applied outside any peak window.
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    /// Apply `rate` instead of the base failure rate between the given hours.
    pub fn peak(mut self, start_hour: u8, end_hour: u8, rate: f64) -> Self {
        self.peak = Some((start_hour, end_hour, rate));
        self
    }

    /// Set the status of injected failures.
    pub fn failure_status(mut self, status: u16) -> Self {
        self.failure_status = status;
        self
    }

    /// Set the body of injected failures.
    pub fn failure_body(mut self, body: impl Into<Bytes>) -> Self {
        self.failure_body = body.into();
        self
    }

    /// Validate and build the profile.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when the name is empty, a failure
    /// rate is outside `[0, 1]`, the jitter range is inverted, the minimum
    /// total delay is negative, the status is outside `100..=599`, or the
    /// peak window is invalid.
    pub fn build(self) -> Result<ConditionProfile, ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        validate_rate(self.failure_rate)?;
        if self.jitter_min_ms > self.jitter_max_ms {
            return Err(ConfigurationError::JitterInverted {
                min_ms: self.jitter_min_ms,
                max_ms: self.jitter_max_ms,
            });
        }
        let base = i64::try_from(self.base_delay_ms).unwrap_or(i64::MAX);
        if base.saturating_add(self.jitter_min_ms) < 0 {
            return Err(ConfigurationError::NegativeDelay {
                base_ms: self.base_delay_ms,
                min_ms: self.jitter_min_ms,
            });
        }
        if !(100..=599).contains(&self.failure_status) {
            return Err(ConfigurationError::Status(self.failure_status));
        }
        let peak = match self.peak {
            Some((start, end, rate)) => {
                validate_rate(rate)?;
                Some(PeakFailure {
                    window: PeakWindow::new(start, end)?,
                    failure_rate: rate,
                })
            }
            None => None,
        };
        Ok(ConditionProfile {
            name: Arc::from(self.name),
            base_delay: Duration::from_millis(self.base_delay_ms),
            jitter: JitterRange {
                min_ms: self.jitter_min_ms,
                max_ms: self.jitter_max_ms,
            },
            failure_rate: self.failure_rate,
            peak,
            failure_response: FailureResponse {
                status: self.failure_status,
                body: self.failure_body,
            },
        })
    }
}

impl From<&ConditionProfile> for ProfileBuilder {
    fn from(profile: &ConditionProfile) -> Self {
        Self {
            name: profile.name.to_string(),
            base_delay_ms: u64::try_from(profile.base_delay.as_millis()).unwrap_or(u64::MAX),
            jitter_min_ms: profile.jitter.min_ms,
            jitter_max_ms: profile.jitter.max_ms,
            failure_rate: profile.failure_rate,
            peak: profile.peak.map(|p| {
                (
                    p.window.start_hour,
                    p.window.end_hour,
                    p.failure_rate,
                )
            }),
            failure_status: profile.failure_response.status,
            failure_body: profile.failure_response.body.clone(),
        }
    }
}

fn validate_rate(rate: f64) -> Result<(), ConfigurationError> {
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(ConfigurationError::FailureRate(rate))
    }
}

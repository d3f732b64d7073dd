//! Fire-and-forget telemetry.
//!
//! [`TelemetryEmitter::record`] never waits and never fails: measurements are
//! queued with `try_send` on a bounded channel and written by a background
//! worker. A full queue, a stopped worker or a failing sink each drop the
//! measurement, bump a counter and log a throttled warning. Nothing is ever
//! retried.

use std::{
    collections::BTreeMap,
    fmt::{self, Write as _},
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{net::UdpSocket, sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

use crate::{error::TelemetryError, metrics::DropReason};

/// Measurement written once per intercepted request.
pub const REQUEST_OUTCOMES: &str = "request_outcomes";
/// Measurement written when a session applies a condition.
pub const TRAFFIC_SIMULATION: &str = "traffic_simulation";
/// Environment tag applied when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "pulse-uk-test";
/// Default emitter queue capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

const DEFAULT_LOG_EVERY_N: usize = 100;
const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Bucket for an elapsed latency: `fast`, `normal`, `slow` or `very_slow`.
#[must_use]
pub fn latency_band(elapsed: Duration) -> &'static str {
    match elapsed.as_millis() {
        0..1000 => "fast",
        1000..3000 => "normal",
        3000..5000 => "slow",
        _ => "very_slow",
    }
}

/// Stress level tag for a named simulation.
#[must_use]
pub fn stress_level(simulation: &str) -> &'static str {
    match simulation.to_ascii_lowercase().replace('_', "-").as_str() {
        "payday-friday" | "peak-payday" | "mobile-payday" => "high",
        "extreme-stress" | "extreme-payday" => "very_high",
        "normal" | "wifi" | "app-wifi" | "app-5g" | "cache-hit" => "low",
        _ => "medium",
    }
}

/// A field value in a measurement.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Free text.
    Str(String),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self { Self::Int(i64::try_from(value).unwrap_or(i64::MAX)) }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self { Self::Float(value) }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self { Self::Str(value.to_owned()) }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self { Self::Str(value) }
}

/// A named measurement with tags, fields and a millisecond timestamp.
///
/// ```
/// use netcondition::telemetry::Measurement;
///
/// let line = Measurement::new("request_outcomes")
///     .tag("outcome", "injected_failure")
///     .field("latency_ms", 1520_i64)
///     .at(1_700_000_000_000)
///     .to_line_protocol()
///     .expect("has a field");
/// assert_eq!(
///     line,
///     "request_outcomes,outcome=injected_failure latency_ms=1520i 1700000000000000000"
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    name: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp_ms: i64,
}

impl Measurement {
    /// Start a measurement stamped with the current wall-clock time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Set a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set a field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn tags(&self) -> &BTreeMap<String, String> { &self.tags }

    /// Value of tag `key`.
    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&str> { self.tags.get(key).map(String::as_str) }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> { &self.fields }

    /// Value of field `key`.
    #[must_use]
    pub fn field_value(&self, key: &str) -> Option<&FieldValue> { self.fields.get(key) }

    #[must_use]
    pub const fn timestamp_ms(&self) -> i64 { self.timestamp_ms }

    /// Encode as one line of InfluxDB line protocol with a nanosecond timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Rejected`] when the measurement has no fields.
    pub fn to_line_protocol(&self) -> Result<String, TelemetryError> {
        if self.fields.is_empty() {
            return Err(TelemetryError::Rejected(format!(
                "measurement {} has no fields",
                self.name
            )));
        }
        let mut line = String::with_capacity(64);
        escape_into(&mut line, &self.name, &[',', ' ']);
        for (key, value) in &self.tags {
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }
        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            match value {
                FieldValue::Int(v) => {
                    let _ = write!(line, "{v}i");
                }
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Bool(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Str(v) => {
                    line.push('"');
                    escape_into(&mut line, v, &['"', '\\']);
                    line.push('"');
                }
            }
        }
        let _ = write!(line, " {}", self.timestamp_ms.saturating_mul(1_000_000));
        Ok(line)
    }
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Destination for measurements.
#[async_trait]
pub trait TelemetrySink: Send + Sync + 'static {
    /// Write one measurement. Called from the emitter worker only.
    async fn record(&self, measurement: &Measurement) -> Result<(), TelemetryError>;
}

#[async_trait]
impl<T> TelemetrySink for Arc<T>
where
    T: TelemetrySink + ?Sized,
{
    async fn record(&self, measurement: &Measurement) -> Result<(), TelemetryError> {
        (**self).record(measurement).await
    }
}

/// Sink that logs each measurement through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn record(&self, measurement: &Measurement) -> Result<(), TelemetryError> {
        info!(
            measurement = measurement.name(),
            tags = ?measurement.tags(),
            fields = ?measurement.fields(),
            "telemetry"
        );
        Ok(())
    }
}

/// Sink writing InfluxDB line protocol datagrams over UDP.
#[derive(Debug)]
pub struct UdpLineSink {
    socket: UdpSocket,
}

impl UdpLineSink {
    /// Bind an ephemeral local socket and connect it to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if binding or resolving `endpoint` fails.
    pub async fn connect(endpoint: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect(endpoint).await?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl TelemetrySink for UdpLineSink {
    async fn record(&self, measurement: &Measurement) -> Result<(), TelemetryError> {
        let line = measurement.to_line_protocol()?;
        self.socket.send(line.as_bytes()).await?;
        Ok(())
    }
}

/// Counts drops and logs the first one, then at most one warning per
/// `every_n` drops or per `interval`.
struct DropLog {
    drops: AtomicUsize,
    last_log: Mutex<Instant>,
    every_n: usize,
    interval: Duration,
}

impl DropLog {
    fn new(every_n: usize, interval: Duration) -> Self {
        Self {
            drops: AtomicUsize::new(0),
            last_log: Mutex::new(Instant::now()),
            every_n: every_n.max(1),
            interval,
        }
    }

    fn note(&self, reason: DropReason, measurement: &str, error: Option<&TelemetryError>) {
        crate::metrics::inc_telemetry_dropped(reason);
        let dropped = self.drops.fetch_add(1, Ordering::Relaxed) + 1;
        let mut last = self.last_log.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if dropped == 1
            || dropped.is_multiple_of(self.every_n)
            || now.duration_since(*last) > self.interval
        {
            warn!(
                measurement,
                reason = reason.as_str(),
                error = error.map(tracing::field::display),
                dropped,
                "telemetry measurement dropped"
            );
            *last = now;
        }
    }
}

struct EmitterInner {
    tx: mpsc::Sender<Measurement>,
    environment: Arc<str>,
    drops: DropLog,
}

/// Handle used to record measurements without waiting.
///
/// Cloning is cheap; all clones feed the same worker. The worker stops once
/// every clone has been dropped and the queue has drained.
#[derive(Clone)]
pub struct TelemetryEmitter {
    inner: Option<Arc<EmitterInner>>,
}

impl fmt::Debug for TelemetryEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryEmitter")
            .field("enabled", &self.is_enabled())
            .field("environment", &self.environment())
            .finish()
    }
}

impl Default for TelemetryEmitter {
    fn default() -> Self { Self::disabled() }
}

impl TelemetryEmitter {
    /// Start building an emitter writing to `sink`.
    pub fn builder<S: TelemetrySink>(sink: S) -> EmitterBuilder<S> { EmitterBuilder::new(sink) }

    /// Spawn an emitter with default settings on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<S: TelemetrySink>(sink: S) -> Self { Self::builder(sink).spawn() }

    /// Emitter that discards every measurement.
    #[must_use]
    pub const fn disabled() -> Self { Self { inner: None } }

    /// Whether measurements are forwarded to a sink.
    #[must_use]
    pub fn is_enabled(&self) -> bool { self.inner.is_some() }

    /// Environment tag stamped on measurements.
    #[must_use]
    pub fn environment(&self) -> Option<&str> { self.inner.as_ref().map(|i| &*i.environment) }

    /// Queue `measurement` for the sink, adding the environment tag if absent.
    ///
    /// Never blocks and never fails; see the module docs for drop handling.
    pub fn record(&self, measurement: Measurement) {
        let Some(inner) = &self.inner else { return };
        let measurement = if measurement.tags.contains_key("environment") {
            measurement
        } else {
            measurement.tag("environment", &*inner.environment)
        };
        match inner.tx.try_send(measurement) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(m)) => {
                inner.drops.note(DropReason::QueueFull, m.name(), None);
            }
            Err(mpsc::error::TrySendError::Closed(m)) => {
                inner.drops.note(DropReason::Closed, m.name(), None);
            }
        }
    }
}

/// Builder for [`TelemetryEmitter`].
pub struct EmitterBuilder<S> {
    sink: S,
    capacity: usize,
    environment: String,
    log_every_n: usize,
    log_interval: Duration,
}

impl<S: TelemetrySink> EmitterBuilder<S> {
    fn new(sink: S) -> Self {
        Self {
            sink,
            capacity: DEFAULT_CAPACITY,
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            log_every_n: DEFAULT_LOG_EVERY_N,
            log_interval: DEFAULT_LOG_INTERVAL,
        }
    }

    /// Queue capacity; measurements beyond it are dropped. Minimum 1.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Environment tag stamped on every measurement.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Throttle drop warnings to one per `every_n` drops or per `interval`.
    #[must_use]
    pub fn drop_log_throttle(mut self, every_n: usize, interval: Duration) -> Self {
        self.log_every_n = every_n;
        self.log_interval = interval;
        self
    }

    /// Spawn the worker task and return the emitter handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> TelemetryEmitter {
        let (tx, rx) = mpsc::channel(self.capacity);
        let inner = Arc::new(EmitterInner {
            tx,
            environment: Arc::from(self.environment),
            drops: DropLog::new(self.log_every_n, self.log_interval),
        });
        let worker_log = DropLog::new(self.log_every_n, self.log_interval);
        tokio::spawn(run_worker(self.sink, rx, worker_log));
        TelemetryEmitter { inner: Some(inner) }
    }
}

async fn run_worker<S: TelemetrySink>(
    sink: S,
    mut rx: mpsc::Receiver<Measurement>,
    drops: DropLog,
) {
    while let Some(measurement) = rx.recv().await {
        if let Err(err) = sink.record(&measurement).await {
            drops.note(DropReason::SinkError, measurement.name(), Some(&err));
        }
    }
    debug!("telemetry worker stopped");
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "fast")]
    #[case(999, "fast")]
    #[case(1000, "normal")]
    #[case(2999, "normal")]
    #[case(4999, "slow")]
    #[case(5000, "very_slow")]
    fn latency_bands_follow_thresholds(#[case] ms: u64, #[case] band: &str) {
        assert_eq!(latency_band(Duration::from_millis(ms)), band);
    }

    #[rstest]
    #[case("payday_friday", "high")]
    #[case("extreme-stress", "very_high")]
    #[case("normal", "low")]
    #[case("3g", "medium")]
    fn stress_levels_by_simulation(#[case] name: &str, #[case] level: &str) {
        assert_eq!(stress_level(name), level);
    }

    #[test]
    fn line_protocol_escapes_special_characters() {
        let line = Measurement::new("traffic simulation")
            .tag("pattern", "**/api/a,b")
            .field("note", r#"say "hi""#)
            .field("ok", true)
            .field("rate", 0.5)
            .at(1)
            .to_line_protocol()
            .expect("encodes");
        assert_eq!(
            line,
            r#"traffic\ simulation,pattern=**/api/a\,b note="say \"hi\"",ok=true,rate=0.5 1000000"#
        );
    }

    #[test]
    fn measurements_without_fields_are_rejected() {
        let err = Measurement::new("empty").to_line_protocol().expect_err("no fields");
        assert!(matches!(err, TelemetryError::Rejected(_)));
    }

    #[test]
    fn disabled_emitter_swallows_everything() {
        let emitter = TelemetryEmitter::disabled();
        emitter.record(Measurement::new("x").field("v", 1_i64));
        assert!(!emitter.is_enabled());
        assert_eq!(emitter.environment(), None);
    }
}

//! Telemetry sinks for asserting on what the emitter delivers.

use std::{
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use netcondition::{
    error::TelemetryError,
    telemetry::{Measurement, TelemetrySink},
};
use tokio::sync::Notify;

/// Sink that keeps every measurement it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    measurements: Mutex<Vec<Measurement>>,
    notify: Notify,
}

impl RecordingSink {
    /// Create a shareable sink.
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Copy of everything recorded so far.
    pub fn measurements(&self) -> Vec<Measurement> {
        self.measurements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded measurements called `name`.
    pub fn named(&self, name: &str) -> Vec<Measurement> {
        self.measurements()
            .into_iter()
            .filter(|m| m.name() == name)
            .collect()
    }

    /// Number of measurements recorded.
    pub fn len(&self) -> usize {
        self.measurements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Wait until at least `count` measurements arrived or `limit` elapsed.
    ///
    /// Returns whether the count was reached. Supports a single waiter.
    pub async fn wait_for(&self, count: usize, limit: Duration) -> bool {
        tokio::time::timeout(limit, async {
            while self.len() < count {
                self.notify.notified().await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn record(&self, measurement: &Measurement) -> Result<(), TelemetryError> {
        self.measurements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(measurement.clone());
        self.notify.notify_one();
        Ok(())
    }
}

/// Sink that rejects everything and counts how often it was tried.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
    notify: Notify,
}

impl FailingSink {
    /// Create a shareable sink.
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Number of write attempts.
    pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }

    /// Wait until at least `count` attempts happened or `limit` elapsed.
    pub async fn wait_for(&self, count: usize, limit: Duration) -> bool {
        tokio::time::timeout(limit, async {
            while self.attempts() < count {
                self.notify.notified().await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl TelemetrySink for FailingSink {
    async fn record(&self, _measurement: &Measurement) -> Result<(), TelemetryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
        Err(TelemetryError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "telemetry backend down",
        )))
    }
}

/// Sink that takes `delay` to write each measurement.
#[derive(Debug)]
pub struct SlowSink {
    delay: Duration,
    inner: RecordingSink,
}

impl SlowSink {
    /// Create a shareable sink taking `delay` per write.
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            inner: RecordingSink::default(),
        })
    }

    /// Measurements written so far.
    pub fn len(&self) -> usize { self.inner.len() }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool { self.inner.is_empty() }
}

#[async_trait]
impl TelemetrySink for SlowSink {
    async fn record(&self, measurement: &Measurement) -> Result<(), TelemetryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.record(measurement).await
    }
}

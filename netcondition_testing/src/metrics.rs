//! Helpers for asserting on `metrics` output with a local debugging recorder.

use metrics::{SharedString, Unit};
use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, DebuggingRecorder},
};

/// One recorded metric as returned by the debugging snapshotter.
pub type RecordedMetric = (CompositeKey, Option<Unit>, Option<SharedString>, DebugValue);

/// Run `f` with a thread-local [`DebuggingRecorder`] and return what it recorded.
///
/// Only metrics emitted on the calling thread are captured, so async code
/// must run on a current-thread runtime inside `f`.
pub fn with_debug_recorder<T>(f: impl FnOnce() -> T) -> (T, Vec<RecordedMetric>) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let value = metrics::with_local_recorder(&recorder, f);
    (value, snapshotter.snapshot().into_vec())
}

fn labelled<'a>(
    recorded: &'a [RecordedMetric],
    name: &'a str,
    labels: &'a [(&str, &str)],
) -> impl Iterator<Item = &'a DebugValue> + 'a {
    recorded
        .iter()
        .filter(move |(key, _, _, _)| {
            key.key().name() == name
                && labels.iter().all(|(k, v)| {
                    key.key()
                        .labels()
                        .any(|label| label.key() == *k && label.value() == *v)
                })
        })
        .map(|(_, _, _, value)| value)
}

/// Sum of counter `name` across entries whose labels include every pair in `labels`.
pub fn counter_value(recorded: &[RecordedMetric], name: &str, labels: &[(&str, &str)]) -> u64 {
    labelled(recorded, name, labels)
        .map(|value| match value {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

/// Last value of gauge `name`, if recorded.
pub fn gauge_value(recorded: &[RecordedMetric], name: &str) -> Option<f64> {
    labelled(recorded, name, &[]).find_map(|value| match value {
        DebugValue::Gauge(g) => Some(g.into_inner()),
        _ => None,
    })
}

/// Number of samples recorded by histogram `name`.
pub fn histogram_samples(recorded: &[RecordedMetric], name: &str) -> usize {
    labelled(recorded, name, &[])
        .map(|value| match value {
            DebugValue::Histogram(samples) => samples.len(),
            _ => 0,
        })
        .sum()
}

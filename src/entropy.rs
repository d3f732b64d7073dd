//! Random draws for jitter and failure injection.
//!
//! By default every draw uses the calling thread's generator. A seeded source
//! serialises draws through a mutex so a dry run can be replayed exactly; the
//! lock is held only for the duration of a single draw.

use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Source of uniform random values.
#[derive(Debug, Default)]
pub struct Entropy(Mode);

#[derive(Debug, Default)]
enum Mode {
    #[default]
    Thread,
    Seeded(Mutex<StdRng>),
}

impl Entropy {
    /// Draw from the thread-local generator.
    #[must_use]
    pub fn thread() -> Self { Self(Mode::Thread) }

    /// Draw from a generator seeded with `seed`.
    #[must_use]
    pub fn seeded(seed: u64) -> Self { Self(Mode::Seeded(Mutex::new(StdRng::seed_from_u64(seed)))) }

    /// Uniform integer in the inclusive range `[min, max]`.
    ///
    /// Returns `min` when the range is empty or inverted.
    pub fn uniform_ms(&self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        match &self.0 {
            Mode::Thread => rand::rng().random_range(min..=max),
            Mode::Seeded(rng) => lock(rng).random_range(min..=max),
        }
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&self) -> f64 {
        match &self.0 {
            Mode::Thread => rand::rng().random::<f64>(),
            Mode::Seeded(rng) => lock(rng).random::<f64>(),
        }
    }

    /// Return `true` with probability `rate`.
    ///
    /// A rate of zero never fires and a rate of one always fires.
    pub fn chance(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        self.unit() < rate
    }
}

fn lock(rng: &Mutex<StdRng>) -> std::sync::MutexGuard<'_, StdRng> {
    rng.lock().unwrap_or_else(PoisonError::into_inner)
}

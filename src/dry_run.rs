//! Offline simulation of a profile against many requests.
//!
//! A dry run registers one profile on a private registry, fires `requests`
//! concurrent requests at a synthetic upstream that always answers `200` and
//! reports what the engine did. Run it on a paused tokio clock
//! (`tokio::time::pause`) to simulate hours of injected delay instantly.

use std::{convert::Infallible, fmt, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::Instant;

use crate::{
    clock::FixedClock,
    entropy::Entropy,
    error::ConfigurationError,
    interceptor::RequestInterceptor,
    middleware::Service,
    pattern::RoutePattern,
    profile::ConditionProfile,
    request::InterceptedRequest,
    response::{Response, ResponseOrigin},
};

struct SyntheticUpstream;

#[async_trait]
impl Service for SyntheticUpstream {
    type Error = Infallible;

    async fn call(&self, _req: InterceptedRequest) -> Result<Response, Self::Error> {
        Ok(Response::new(200, r#"{"ok":true}"#))
    }
}

/// Configuration of a dry run.
#[derive(Clone, Debug)]
#[must_use]
pub struct DryRun {
    profile: ConditionProfile,
    pattern: String,
    path: String,
    requests: usize,
    seed: Option<u64>,
    clock: Option<FixedClock>,
}

impl DryRun {
    /// Simulate `profile` on `**`, requesting `/api/simulated` 100 times.
    pub fn new(profile: ConditionProfile) -> Self {
        Self {
            profile,
            pattern: "**".to_owned(),
            path: "/api/simulated".to_owned(),
            requests: 100,
            seed: None,
            clock: None,
        }
    }

    /// Pattern the profile is registered under.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Path every simulated request targets.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Number of requests to simulate.
    pub fn requests(mut self, requests: usize) -> Self {
        self.requests = requests;
        self
    }

    /// Seed the random source for a reproducible run.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Evaluate peak windows at a fixed time of day.
    pub fn at(mut self, clock: FixedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Run the simulation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the pattern is malformed.
    pub async fn run(&self) -> Result<DryRunReport, ConfigurationError> {
        let pattern = RoutePattern::new(&self.pattern)?;
        let mut builder = RequestInterceptor::builder().entropy(
            self.seed.map_or_else(Entropy::thread, Entropy::seeded),
        );
        if let Some(clock) = self.clock {
            builder = builder.clock(clock);
        }
        let interceptor = builder.build(SyntheticUpstream);
        interceptor
            .registry()
            .register(pattern.as_str(), self.profile.clone())?;

        let runs = (0..self.requests).map(|_| {
            let interceptor = interceptor.clone();
            let request = InterceptedRequest::get(self.path.clone());
            async move {
                let started = Instant::now();
                let result = interceptor.handle(request).await;
                (result.map(|r| r.origin()).ok(), started.elapsed())
            }
        });
        let results = join_all(runs).await;
        let claimed = pattern.matches(&self.path);
        Ok(DryRunReport::from_results(&results, claimed))
    }
}

/// Summary of a dry run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DryRunReport {
    /// Requests simulated.
    pub requests: usize,
    /// Requests answered with the injected failure response.
    pub injected_failures: usize,
    /// Requests forwarded after their delay.
    pub forwarded: usize,
    /// Requests the pattern did not claim.
    pub pass_through: usize,
    /// Shortest latency observed.
    pub min_latency: Duration,
    /// Longest latency observed.
    pub max_latency: Duration,
    /// Mean latency over all requests.
    pub mean_latency: Duration,
    /// Shortest latency among forwarded requests.
    pub min_forwarded_latency: Option<Duration>,
}

impl DryRunReport {
    fn from_results(results: &[(Option<ResponseOrigin>, Duration)], claimed: bool) -> Self {
        let mut report = Self {
            requests: results.len(),
            min_latency: results.iter().map(|(_, d)| *d).min().unwrap_or_default(),
            max_latency: results.iter().map(|(_, d)| *d).max().unwrap_or_default(),
            ..Self::default()
        };
        let total: Duration = results.iter().map(|(_, d)| *d).sum();
        report.mean_latency = u32::try_from(results.len())
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| total / n);
        for (origin, elapsed) in results {
            match origin {
                Some(ResponseOrigin::Injected) => report.injected_failures += 1,
                Some(ResponseOrigin::Upstream) if !claimed => report.pass_through += 1,
                Some(_) => {
                    report.forwarded += 1;
                    report.min_forwarded_latency = Some(
                        report
                            .min_forwarded_latency
                            .map_or(*elapsed, |m| m.min(*elapsed)),
                    );
                }
                None => {}
            }
        }
        report
    }

    /// Fraction of requests that received an injected failure.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "request counts are small")]
    pub fn failure_proportion(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.injected_failures as f64 / self.requests as f64
    }
}

impl fmt::Display for DryRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "requests:          {}", self.requests)?;
        writeln!(
            f,
            "injected failures: {} ({:.1}%)",
            self.injected_failures,
            self.failure_proportion() * 100.0
        )?;
        writeln!(f, "forwarded:         {}", self.forwarded)?;
        writeln!(f, "pass-through:      {}", self.pass_through)?;
        writeln!(f, "latency min:       {} ms", self.min_latency.as_millis())?;
        writeln!(f, "latency mean:      {} ms", self.mean_latency.as_millis())?;
        write!(f, "latency max:       {} ms", self.max_latency.as_millis())
    }
}

//! Request interceptor applying registered conditions to outbound requests.
//!
//! For every request the interceptor resolves the claiming registry entry
//! and then:
//!
//! 1. forwards unmodified when nothing claims the request;
//! 2. samples `base_delay + jitter`, clamped at zero;
//! 3. sleeps for that delay on the request's own task;
//! 4. draws once against the failure rate in force *now* (after the delay),
//!    substituting the profile's failure response without forwarding on a hit;
//! 5. otherwise forwards to the real destination;
//! 6. records the outcome through the telemetry emitter.
//!
//! Injected failures and upstream failures both come back as ordinary
//! [`Response`]s with different [`ResponseOrigin`]s. Only engine faults, such
//! as a panicking custom handler, are returned as [`AbortError`].

use std::{fmt, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::{
    clock::{Clock, SystemClock},
    entropy::Entropy,
    error::{AbortError, ForwardError},
    hooks::{HandlerDecision, RouteHandler},
    middleware::{Service, Transform},
    panic::format_panic,
    profile::ConditionProfile,
    registry::{InterceptorRegistry, RegistryEntry, RouteAction},
    request::InterceptedRequest,
    response::{Response, ResponseOrigin},
    session::ScenarioSession,
    telemetry::{Measurement, REQUEST_OUTCOMES, TelemetryEmitter, latency_band},
};

/// How an intercepted request was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// No entry claimed the request; it was forwarded unmodified.
    PassThrough,
    /// A profile or handler claimed the request and it was forwarded.
    Forwarded,
    /// The engine substituted the profile's failure response.
    InjectedFailure,
    /// Forwarding failed on its own.
    ForwardError,
    /// A custom handler supplied the response.
    Fulfilled,
    /// A custom handler aborted or panicked.
    Aborted,
}

impl Outcome {
    /// Stable label used in logs, metrics and telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Forwarded => "forwarded",
            Self::InjectedFailure => "injected_failure",
            Self::ForwardError => "forward_error",
            Self::Fulfilled => "fulfilled",
            Self::Aborted => "aborted",
        }
    }

    /// Classify a finished request from its response origin.
    fn of(result: &Result<Response, AbortError>, claimed: bool) -> Self {
        match result {
            Err(_) => Self::Aborted,
            Ok(response) => match response.origin() {
                ResponseOrigin::Injected => Self::InjectedFailure,
                ResponseOrigin::ForwardError => Self::ForwardError,
                ResponseOrigin::Handler => Self::Fulfilled,
                ResponseOrigin::Upstream if claimed => Self::Forwarded,
                ResponseOrigin::Upstream => Self::PassThrough,
            },
        }
    }
}

struct Inner<S> {
    registry: Arc<InterceptorRegistry>,
    upstream: S,
    telemetry: TelemetryEmitter,
    clock: Arc<dyn Clock>,
    entropy: Arc<Entropy>,
    tracker: TaskTracker,
}

/// Applies registered conditions in front of an upstream [`Service`].
///
/// Cloning is cheap and clones share the registry, upstream and in-flight
/// task tracker.
///
/// ```no_run
/// use netcondition::{
///     interceptor::RequestInterceptor,
///     presets,
///     request::InterceptedRequest,
/// };
/// # use netcondition::{middleware::Service, response::Response};
/// # struct Upstream;
/// # #[async_trait::async_trait]
/// # impl Service for Upstream {
/// #     type Error = std::io::Error;
/// #     async fn call(&self, _: InterceptedRequest) -> Result<Response, Self::Error> {
/// #         Ok(Response::new(200, "ok"))
/// #     }
/// # }
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let interceptor = RequestInterceptor::builder().build(Upstream);
/// interceptor
///     .registry()
///     .register("**/api/**", presets::preset("3g")?)?;
///
/// let response = interceptor
///     .handle(InterceptedRequest::get("https://bank.test/api/balance"))
///     .await?;
/// println!("{} via {:?}", response.status(), response.origin());
/// # Ok(())
/// # }
/// ```
pub struct RequestInterceptor<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for RequestInterceptor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for RequestInterceptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("registry", &self.inner.registry)
            .field("telemetry", &self.inner.telemetry)
            .field("in_flight", &self.inner.tracker.len())
            .finish_non_exhaustive()
    }
}

impl RequestInterceptor<()> {
    /// Start configuring an interceptor.
    pub fn builder() -> InterceptorBuilder { InterceptorBuilder::new() }
}

impl<S> RequestInterceptor<S>
where
    S: Service + 'static,
{
    /// Registry consulted for every request.
    #[must_use]
    pub fn registry(&self) -> &Arc<InterceptorRegistry> { &self.inner.registry }

    /// Telemetry emitter used for outcome records.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryEmitter { &self.inner.telemetry }

    /// Open a scenario session on this interceptor's registry and telemetry.
    pub fn session(&self, name: impl Into<String>) -> ScenarioSession {
        ScenarioSession::new(Arc::clone(&self.inner.registry), name)
            .with_telemetry(self.inner.telemetry.clone())
    }

    /// Run the full interception protocol for `request`.
    ///
    /// # Errors
    ///
    /// Returns an [`AbortError`] only when a custom handler aborts or panics.
    /// Injected failures and upstream failures are `Ok` responses.
    pub async fn handle(&self, request: InterceptedRequest) -> Result<Response, AbortError> {
        let started = Instant::now();
        let entry = self.inner.registry.resolve_request(&request);
        let method = request.method().to_owned();
        let target = request.target().to_owned();

        let (result, injected_delay) = match entry.as_deref() {
            None => (Ok(self.forward(request).await), Duration::ZERO),
            Some(entry) => match entry.action() {
                RouteAction::Condition(profile) => self.apply_profile(profile, request).await,
                RouteAction::Handler(handler) => {
                    self.apply_handler(entry, handler.as_ref(), request).await
                }
            },
        };

        let outcome = Outcome::of(&result, entry.is_some());
        let elapsed = started.elapsed();
        crate::metrics::inc_requests(outcome.as_str());
        debug!(
            method = %method,
            target = %target,
            pattern = entry.as_ref().map(|e| e.pattern().as_str()),
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis(),
            "request intercepted"
        );
        self.inner.telemetry.record(outcome_measurement(
            entry.as_deref(),
            &method,
            outcome,
            &result,
            elapsed,
            injected_delay,
        ));
        result
    }

    /// Handle `request` on its own tracked task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(&self, request: InterceptedRequest) -> JoinHandle<Result<Response, AbortError>> {
        let this = self.clone();
        self.inner.tracker.spawn(async move { this.handle(request).await })
    }

    /// Number of spawned requests still in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.inner.tracker.len() }

    /// Wait for every spawned request to finish. New requests may still be
    /// spawned while and after draining.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }

    async fn apply_profile(
        &self,
        profile: &ConditionProfile,
        request: InterceptedRequest,
    ) -> (Result<Response, AbortError>, Duration) {
        let delay = profile.sample_delay(&self.inner.entropy);
        if !delay.is_zero() {
            crate::metrics::observe_delay(delay);
            tokio::time::sleep(delay).await;
        }

        let rate = profile.failure_rate_at(self.inner.clock.time_of_day());
        if self.inner.entropy.chance(rate) {
            debug!(
                profile = profile.name(),
                rate,
                status = profile.failure_response().status(),
                "failure injected"
            );
            return (Ok(Response::injected(profile.failure_response())), delay);
        }
        (Ok(self.forward(request).await), delay)
    }

    async fn apply_handler(
        &self,
        entry: &RegistryEntry,
        handler: &dyn RouteHandler,
        request: InterceptedRequest,
    ) -> (Result<Response, AbortError>, Duration) {
        let pattern = entry.pattern().as_str();
        let decision = AssertUnwindSafe(handler.handle(&request)).catch_unwind().await;
        match decision {
            Ok(HandlerDecision::Continue) => (Ok(self.forward(request).await), Duration::ZERO),
            Ok(HandlerDecision::ContinueAfter(delay)) => {
                crate::metrics::observe_delay(delay);
                tokio::time::sleep(delay).await;
                (Ok(self.forward(request).await), delay)
            }
            Ok(HandlerDecision::Fulfill(response)) => (Ok(response.from_handler()), Duration::ZERO),
            Ok(HandlerDecision::Abort(reason)) => {
                debug!(pattern, handler = handler.name(), reason = %reason, "handler aborted request");
                (
                    Err(AbortError::HandlerAborted {
                        pattern: pattern.to_owned(),
                        reason,
                    }),
                    Duration::ZERO,
                )
            }
            Err(panic) => {
                crate::metrics::inc_handler_panics();
                let message = format_panic(panic.as_ref()).to_string();
                error!(pattern, handler = handler.name(), panic = %message, "route handler panicked");
                (
                    Err(AbortError::HandlerPanicked {
                        pattern: pattern.to_owned(),
                        message,
                    }),
                    Duration::ZERO,
                )
            }
        }
    }

    async fn forward(&self, request: InterceptedRequest) -> Response {
        match self.inner.upstream.call(request).await {
            Ok(response) => response,
            Err(err) => {
                let err = ForwardError::new(err);
                warn!(error = %err, "upstream call failed");
                Response::forward_error(&err)
            }
        }
    }
}

fn outcome_measurement(
    entry: Option<&RegistryEntry>,
    method: &str,
    outcome: Outcome,
    result: &Result<Response, AbortError>,
    elapsed: Duration,
    injected_delay: Duration,
) -> Measurement {
    let mut measurement = Measurement::new(REQUEST_OUTCOMES)
        .tag("outcome", outcome.as_str())
        .tag("method", method)
        .tag("latency_band", latency_band(elapsed))
        .tag("pattern", entry.map_or("none", |e| e.pattern().as_str()))
        .tag("profile", entry.map_or("none", |e| e.action().label()))
        .field("latency_ms", millis(elapsed))
        .field("injected_delay_ms", millis(injected_delay))
        .field("success", matches!(result, Ok(r) if r.is_success()));
    if let Some(scenario) = entry.and_then(RegistryEntry::scenario) {
        measurement = measurement.tag("scenario", scenario);
    }
    if let Ok(response) = result {
        measurement = measurement.field("status", i64::from(response.status()));
    }
    measurement
}

fn millis(duration: Duration) -> i64 { i64::try_from(duration.as_millis()).unwrap_or(i64::MAX) }

#[async_trait]
impl<S> Service for RequestInterceptor<S>
where
    S: Service + 'static,
{
    type Error = AbortError;

    async fn call(&self, req: InterceptedRequest) -> Result<Response, Self::Error> {
        self.handle(req).await
    }
}

/// Builder for [`RequestInterceptor`].
#[derive(Clone)]
#[must_use]
pub struct InterceptorBuilder {
    registry: Option<Arc<InterceptorRegistry>>,
    telemetry: TelemetryEmitter,
    clock: Arc<dyn Clock>,
    entropy: Arc<Entropy>,
}

impl fmt::Debug for InterceptorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorBuilder")
            .field("registry", &self.registry)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl Default for InterceptorBuilder {
    fn default() -> Self { Self::new() }
}

impl InterceptorBuilder {
    /// Fresh registry, disabled telemetry, system clock and thread entropy.
    pub fn new() -> Self {
        Self {
            registry: None,
            telemetry: TelemetryEmitter::disabled(),
            clock: Arc::new(SystemClock),
            entropy: Arc::new(Entropy::thread()),
        }
    }

    /// Share an existing registry.
    pub fn registry(mut self, registry: Arc<InterceptorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Record outcomes through `telemetry`.
    pub fn telemetry(mut self, telemetry: TelemetryEmitter) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Evaluate peak windows against `clock`.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Draw jitter and failures from `entropy`.
    pub fn entropy(mut self, entropy: Entropy) -> Self {
        self.entropy = Arc::new(entropy);
        self
    }

    /// Shorthand for a seeded [`Entropy`].
    pub fn seed(self, seed: u64) -> Self { self.entropy(Entropy::seeded(seed)) }

    /// Finish the interceptor in front of `upstream`.
    #[must_use]
    pub fn build<S: Service + 'static>(self, upstream: S) -> RequestInterceptor<S> {
        RequestInterceptor {
            inner: Arc::new(Inner {
                registry: self.registry.unwrap_or_default(),
                upstream,
                telemetry: self.telemetry,
                clock: self.clock,
                entropy: self.entropy,
                tracker: TaskTracker::new(),
            }),
        }
    }
}

/// [`Transform`] installing a [`RequestInterceptor`] in front of a service.
#[derive(Clone, Debug, Default)]
pub struct ConditionLayer {
    builder: InterceptorBuilder,
}

impl ConditionLayer {
    /// Every wrapped service gets an interceptor configured like `builder`.
    ///
    /// Share a registry through the builder so one registration applies to
    /// every wrapped service.
    pub fn new(builder: InterceptorBuilder) -> Self { Self { builder } }
}

#[async_trait]
impl<S> Transform<S> for ConditionLayer
where
    S: Service + 'static,
{
    type Output = RequestInterceptor<S>;

    async fn transform(&self, service: S) -> Self::Output { self.builder.clone().build(service) }
}

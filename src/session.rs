//! Scenario sessions owning a group of registry entries.
//!
//! A [`ScenarioSession`] is a handle onto a shared [`InterceptorRegistry`].
//! Entries registered through it are tagged with its [`SessionId`] and are
//! removed when the session ends or is dropped, leaving entries owned by
//! other sessions in place.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::info;

use crate::{
    error::ConfigurationError,
    hooks::RouteHandler,
    pattern::RoutePattern,
    presets,
    profile::ConditionProfile,
    registry::{InterceptorRegistry, Origin, RegistryEntry, RouteAction},
    telemetry::{Measurement, TRAFFIC_SIMULATION, TelemetryEmitter, stress_level},
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to a scenario session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self { Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)) }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "SessionId({})", self.0) }
}

/// Lifetime grouping of the entries active for one test scenario.
///
/// ```
/// use std::sync::Arc;
///
/// use netcondition::{registry::InterceptorRegistry, session::ScenarioSession};
///
/// let registry = Arc::new(InterceptorRegistry::new());
/// let session = ScenarioSession::new(Arc::clone(&registry), "payday");
/// session.apply_scenario("payday-friday")?;
/// assert_eq!(registry.len(), 3);
///
/// session.end();
/// assert!(registry.is_empty());
/// # Ok::<(), netcondition::error::ConfigurationError>(())
/// ```
pub struct ScenarioSession {
    id: SessionId,
    name: Arc<str>,
    registry: Arc<InterceptorRegistry>,
    telemetry: TelemetryEmitter,
    ended: bool,
}

impl fmt::Debug for ScenarioSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ScenarioSession {
    /// Open a session named `name` on `registry`.
    pub fn new(registry: Arc<InterceptorRegistry>, name: impl Into<String>) -> Self {
        let id = SessionId::next();
        let name: Arc<str> = Arc::from(name.into());
        info!(session = %id, name = %name, "scenario session opened");
        Self {
            id,
            name,
            registry,
            telemetry: TelemetryEmitter::disabled(),
            ended: false,
        }
    }

    /// Emit a `traffic_simulation` measurement for every condition applied.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetryEmitter) -> Self {
        self.telemetry = telemetry;
        self
    }

    #[must_use]
    pub const fn id(&self) -> SessionId { self.id }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Registry this session writes to.
    #[must_use]
    pub fn registry(&self) -> &Arc<InterceptorRegistry> { &self.registry }

    /// Register `profile` for `pattern` on behalf of this session.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `pattern` is malformed.
    pub fn register(&self, pattern: &str, profile: ConditionProfile) -> Result<u64, ConfigurationError> {
        let pattern = RoutePattern::new(pattern)?;
        Ok(self.insert_profile(pattern, profile, None))
    }

    /// Register custom handler logic for `pattern` on behalf of this session.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `pattern` is malformed.
    pub fn register_handler(
        &self,
        pattern: &str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<u64, ConfigurationError> {
        let pattern = RoutePattern::new(pattern)?;
        Ok(self.registry.insert(
            pattern,
            RouteAction::Handler(handler),
            Origin::Session(self.id),
            Some(Arc::clone(&self.name)),
        ))
    }

    /// Register the named preset for `pattern`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the pattern is malformed or the
    /// preset is unknown.
    pub fn apply_preset(&self, pattern: &str, preset: &str) -> Result<u64, ConfigurationError> {
        let profile = presets::preset(preset)?;
        self.register(pattern, profile)
    }

    /// Register every route of the named scenario bundle, in order.
    ///
    /// Every route is validated before any is registered, so a failure leaves
    /// the registry untouched. Returns the number of routes registered.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the scenario is unknown or one of
    /// its routes is invalid.
    pub fn apply_scenario(&self, scenario: &str) -> Result<usize, ConfigurationError> {
        let spec = presets::scenario(scenario)?;
        let routes = spec
            .routes
            .iter()
            .map(|(pattern, preset)| Ok((RoutePattern::new(pattern)?, presets::preset(preset)?)))
            .collect::<Result<Vec<_>, ConfigurationError>>()?;
        let label: Arc<str> = Arc::from(spec.name);
        for (pattern, profile) in &routes {
            self.insert_profile(pattern.clone(), profile.clone(), Some(&label));
        }
        info!(session = %self.id, scenario = spec.name, routes = routes.len(), "scenario applied");
        Ok(routes.len())
    }

    /// Remove every entry rooted under `prefix`, whichever session owns it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `prefix` is malformed.
    pub fn clear_simulations(&self, prefix: &str) -> Result<usize, ConfigurationError> {
        self.registry.clear(prefix)
    }

    /// Entries currently owned by this session, least recent first.
    #[must_use]
    pub fn entries(&self) -> Vec<Arc<RegistryEntry>> {
        self.registry
            .snapshot()
            .iter()
            .filter(|e| e.origin() == Origin::Session(self.id))
            .cloned()
            .collect()
    }

    /// End the session, removing the entries it owns. Returns how many were removed.
    ///
    /// Requests already holding one of those entries finish with it.
    pub fn end(mut self) -> usize {
        self.ended = true;
        self.release()
    }

    fn release(&self) -> usize {
        let removed = self.registry.remove_origin(Origin::Session(self.id));
        info!(session = %self.id, name = %self.name, removed, "scenario session ended");
        removed
    }

    fn insert_profile(
        &self,
        pattern: RoutePattern,
        profile: ConditionProfile,
        simulation: Option<&Arc<str>>,
    ) -> u64 {
        let simulation_type = simulation.map_or_else(|| Arc::from(profile.name()), Arc::clone);
        let measurement = Measurement::new(TRAFFIC_SIMULATION)
            .tag("simulation_type", &*simulation_type)
            .tag("stress_level", stress_level(&simulation_type))
            .tag("pattern", pattern.as_str())
            .tag("session", &*self.name)
            .field("average_delay_ms", millis(profile.mean_delay()))
            .field("failure_rate", profile.failure_rate());
        let sequence = self.registry.insert(
            pattern,
            RouteAction::Condition(Arc::new(profile)),
            Origin::Session(self.id),
            Some(Arc::clone(&self.name)),
        );
        self.telemetry.record(measurement);
        sequence
    }
}

impl Drop for ScenarioSession {
    fn drop(&mut self) {
        if !self.ended {
            self.release();
        }
    }
}

fn millis(duration: std::time::Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

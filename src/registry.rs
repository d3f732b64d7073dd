//! Ordered registry mapping route patterns to condition profiles or handlers.
//!
//! Readers load the current entry list through [`ArcSwap`] without taking a
//! lock. Writers serialise on a mutex, clone the list, edit the copy and
//! publish it with a single atomic store, so a concurrent `resolve` sees
//! either the old list or the new one and never a partial edit. Requests
//! that already resolved an entry keep their `Arc` to it and finish with the
//! profile they started with.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use arc_swap::ArcSwap;
use tracing::{debug, info};

use crate::{
    error::ConfigurationError,
    hooks::RouteHandler,
    pattern::RoutePattern,
    profile::ConditionProfile,
    request::InterceptedRequest,
    session::SessionId,
};

/// What an entry does with the requests it claims.
#[derive(Clone)]
pub enum RouteAction {
    /// Apply the delay and failure protocol described by the profile.
    Condition(Arc<ConditionProfile>),
    /// Defer to custom handler logic.
    Handler(Arc<dyn RouteHandler>),
}

impl RouteAction {
    /// Profile or handler name used in logs and telemetry.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Condition(profile) => profile.name(),
            Self::Handler(handler) => handler.name(),
        }
    }
}

impl fmt::Debug for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition(profile) => f.debug_tuple("Condition").field(profile).finish(),
            Self::Handler(handler) => f.debug_tuple("Handler").field(&handler.name()).finish(),
        }
    }
}

/// Who registered an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Registered directly on the registry.
    Direct,
    /// Registered through a scenario session.
    Session(SessionId),
}

/// One registered route.
#[derive(Debug)]
pub struct RegistryEntry {
    pattern: RoutePattern,
    action: RouteAction,
    sequence: u64,
    origin: Origin,
    scenario: Option<Arc<str>>,
}

impl RegistryEntry {
    /// Pattern claiming requests for this entry.
    #[must_use]
    pub fn pattern(&self) -> &RoutePattern { &self.pattern }

    /// Profile or handler applied to claimed requests.
    #[must_use]
    pub fn action(&self) -> &RouteAction { &self.action }

    /// The profile, if this entry applies one.
    #[must_use]
    pub fn profile(&self) -> Option<&Arc<ConditionProfile>> {
        match &self.action {
            RouteAction::Condition(profile) => Some(profile),
            RouteAction::Handler(_) => None,
        }
    }

    /// Registration sequence; higher numbers are more recent.
    #[must_use]
    pub const fn sequence(&self) -> u64 { self.sequence }

    /// Who registered the entry.
    #[must_use]
    pub const fn origin(&self) -> Origin { self.origin }

    /// Scenario name of the owning session, if any.
    #[must_use]
    pub fn scenario(&self) -> Option<&str> { self.scenario.as_deref() }
}

/// Registry of active routes.
///
/// The most recently registered entry whose pattern matches a request is the
/// one applied; earlier matching entries are never consulted for it.
///
/// ```
/// use netcondition::{presets, registry::InterceptorRegistry};
///
/// let registry = InterceptorRegistry::new();
/// registry.register("**/api/**", presets::preset("4g")?)?;
/// registry.register("**/api/payments/**", presets::preset("3g")?)?;
///
/// let entry = registry.resolve("/api/payments/7").expect("claimed");
/// assert_eq!(entry.action().label(), "3g");
/// # Ok::<(), netcondition::error::ConfigurationError>(())
/// ```
pub struct InterceptorRegistry {
    entries: ArcSwap<Vec<Arc<RegistryEntry>>>,
    next_sequence: Mutex<u64>,
}

impl Default for InterceptorRegistry {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl InterceptorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_sequence: Mutex::new(1),
        }
    }

    /// Register `profile` for `pattern`, returning the entry's sequence number.
    ///
    /// Re-registering a pattern replaces the previous direct entry for it and
    /// makes the replacement the most recent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `pattern` is malformed.
    pub fn register(&self, pattern: &str, profile: ConditionProfile) -> Result<u64, ConfigurationError> {
        let pattern = RoutePattern::new(pattern)?;
        Ok(self.insert(
            pattern,
            RouteAction::Condition(Arc::new(profile)),
            Origin::Direct,
            None,
        ))
    }

    /// Register custom handler logic for `pattern`.
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
        Ok(self.insert(pattern, RouteAction::Handler(handler), Origin::Direct, None))
    }

    /// Insert or replace the entry keyed by `(pattern, origin)`.
    pub(crate) fn insert(
        &self,
        pattern: RoutePattern,
        action: RouteAction,
        origin: Origin,
        scenario: Option<Arc<str>>,
    ) -> u64 {
        let mut next_sequence = self.next_sequence.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = *next_sequence;
        *next_sequence += 1;

        let label = action.label().to_owned();
        let entry = Arc::new(RegistryEntry {
            pattern,
            action,
            sequence,
            origin,
            scenario,
        });
        let mut next: Vec<_> = self
            .entries
            .load()
            .iter()
            .filter(|e| !(e.origin == origin && e.pattern == entry.pattern))
            .cloned()
            .collect();
        let replaced = next.len() < self.entries.load().len();
        info!(
            pattern = %entry.pattern,
            profile = %label,
            sequence,
            ?origin,
            replaced,
            "route registered"
        );
        next.push(entry);
        self.publish(next);
        sequence
    }

    /// Most recent entry whose pattern matches `target`, or `None` for pass-through.
    #[must_use]
    pub fn resolve(&self, target: &str) -> Option<Arc<RegistryEntry>> {
        let found = self.find(|pattern| pattern.matches(target));
        debug!(
            target,
            pattern = found.as_ref().map(|e| e.pattern.as_str()),
            "route resolved"
        );
        found
    }

    /// Most recent entry claiming `request`.
    ///
    /// An entry claims the request when its pattern matches the request
    /// path or, failing that, the scheme- and host-qualified target. Entries
    /// are still visited newest first, so an older path match never shadows a
    /// newer host-qualified one.
    ///
    /// ```
    /// use netcondition::{InterceptedRequest, InterceptorRegistry, presets::preset};
    ///
    /// let registry = InterceptorRegistry::new();
    /// registry.register("/api/app/init", preset("app-startup")?)?;
    /// let request = InterceptedRequest::get("https://bank.test/api/app/init?cold=1");
    /// assert!(registry.resolve_request(&request).is_some());
    /// # Ok::<(), netcondition::ConfigurationError>(())
    /// ```
    #[must_use]
    pub fn resolve_request(&self, request: &InterceptedRequest) -> Option<Arc<RegistryEntry>> {
        let path = request.path();
        let target = request.target();
        let found = self.find(|pattern| pattern.matches(path) || pattern.matches(target));
        debug!(
            path,
            target,
            pattern = found.as_ref().map(|e| e.pattern.as_str()),
            "route resolved"
        );
        found
    }

    fn find(&self, claims: impl Fn(&RoutePattern) -> bool) -> Option<Arc<RegistryEntry>> {
        self.entries.load().iter().rev().find(|e| claims(&e.pattern)).cloned()
    }

    /// Profile of the entry claiming `target`, if that entry applies a profile.
    #[must_use]
    pub fn resolve_profile(&self, target: &str) -> Option<Arc<ConditionProfile>> {
        self.resolve(target).and_then(|e| e.profile().cloned())
    }

    /// Remove every entry rooted under `prefix`; `*` or `**` removes all.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `prefix` is malformed.
    pub fn clear(&self, prefix: &str) -> Result<usize, ConfigurationError> {
        let prefix = RoutePattern::new(prefix)?;
        let removed = self.retain(|e| !e.pattern.rooted_under(&prefix));
        info!(prefix = %prefix, removed, "routes cleared");
        Ok(removed)
    }

    /// Remove every entry.
    pub fn clear_all(&self) -> usize {
        let removed = self.retain(|_| false);
        info!(removed, "all routes cleared");
        removed
    }

    /// Remove entries whose pattern is exactly `pattern`, whatever their origin.
    pub fn remove(&self, pattern: &str) -> usize {
        let removed = self.retain(|e| e.pattern.as_str() != pattern);
        info!(pattern, removed, "route removed");
        removed
    }

    /// Remove every entry registered by `origin`.
    pub(crate) fn remove_origin(&self, origin: Origin) -> usize {
        let removed = self.retain(|e| e.origin != origin);
        debug!(?origin, removed, "routes released");
        removed
    }

    /// Current entries, least recent first.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Arc<RegistryEntry>>> { self.entries.load_full() }

    /// Number of active entries.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.load().len() }

    /// Whether no entry is active.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.load().is_empty() }

    fn retain(&self, keep: impl Fn(&RegistryEntry) -> bool) -> usize {
        let _writer = self.next_sequence.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load();
        let next: Vec<_> = current.iter().filter(|e| keep(e)).cloned().collect();
        let removed = current.len() - next.len();
        if removed > 0 {
            self.publish(next);
        }
        removed
    }

    fn publish(&self, next: Vec<Arc<RegistryEntry>>) {
        crate::metrics::set_registry_entries(next.len());
        self.entries.store(Arc::new(next));
    }
}

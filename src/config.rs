//! TOML configuration surface.
//!
//! ```toml
//! [telemetry]
//! capacity = 512
//! environment = "staging"
//! udp_endpoint = "127.0.0.1:8089"
//!
//! [[scenarios]]
//! name = "real-app-caching"
//!
//! [[routes]]
//! pattern = "**/api/payments/**"
//! preset = "peak-payday"
//! failure_status = 500
//!
//! [[routes]]
//! pattern = "**/api/balance/**"
//! base_delay_ms = 400
//! jitter_min_ms = 0
//! jitter_max_ms = 200
//! failure_rate = 0.05
//!
//! [routes.peak]
//! start_hour = 17
//! end_hour = 19
//! failure_rate = 0.2
//! ```
//!
//! Explicit route fields override the named preset. Every entry is
//! validated before anything is registered.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    error::ConfigurationError,
    pattern::RoutePattern,
    presets,
    profile::{ConditionProfile, ProfileBuilder},
    session::ScenarioSession,
    telemetry::{
        DEFAULT_CAPACITY,
        DEFAULT_ENVIRONMENT,
        TelemetryEmitter,
        TracingSink,
        UdpLineSink,
    },
};

/// Errors raised while loading or applying an [`EngineConfig`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The document is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A `[[routes]]` entry is invalid.
    #[error("route #{index} ({pattern}) is invalid: {source}")]
    Route {
        /// Zero-based position in `[[routes]]`.
        index: usize,
        /// Pattern as written.
        pattern: String,
        /// Validation failure.
        #[source]
        source: ConfigurationError,
    },
    /// A `[[scenarios]]` entry is invalid.
    #[error("scenario #{index} is invalid: {source}")]
    Scenario {
        /// Zero-based position in `[[scenarios]]`.
        index: usize,
        /// Validation failure.
        #[source]
        source: ConfigurationError,
    },
    /// The UDP telemetry sink could not be set up.
    #[error("telemetry sink setup failed: {0}")]
    Telemetry(#[source] io::Error),
}

/// Root of the configuration document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// `[telemetry]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Emitter queue capacity.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Environment tag stamped on every measurement.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// `host:port` receiving line protocol datagrams; logs via `tracing` when absent.
    #[serde(default)]
    pub udp_endpoint: Option<String>,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            udp_endpoint: None,
        }
    }
}

fn default_capacity() -> usize { DEFAULT_CAPACITY }

fn default_environment() -> String { DEFAULT_ENVIRONMENT.to_owned() }

/// `[[scenarios]]` entry naming a scenario bundle.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub name: String,
}

/// `[[routes]]` entry.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub pattern: String,
    /// Preset supplying defaults for every field below.
    #[serde(default)]
    pub preset: Option<String>,
    /// Profile name; defaults to the preset name or the pattern.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub jitter_min_ms: Option<i64>,
    #[serde(default)]
    pub jitter_max_ms: Option<i64>,
    #[serde(default)]
    pub failure_rate: Option<f64>,
    #[serde(default)]
    pub failure_status: Option<u16>,
    #[serde(default)]
    pub failure_body: Option<String>,
    #[serde(default)]
    pub peak: Option<PeakConfig>,
}

/// `[routes.peak]` table.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeakConfig {
    pub start_hour: u8,
    pub end_hour: u8,
    pub failure_rate: f64,
}

impl RouteConfig {
    /// Build the profile described by this entry.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for an unknown preset or invalid values.
    pub fn profile(&self) -> Result<ConditionProfile, ConfigurationError> {
        let base = self.preset.as_deref().map(presets::preset).transpose()?;
        let mut builder = match &base {
            Some(profile) => ProfileBuilder::from(profile),
            None => ConditionProfile::builder(self.pattern.clone()),
        };
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(ms) = self.base_delay_ms {
            builder = builder.base_delay_ms(ms);
        }
        if self.jitter_min_ms.is_some() || self.jitter_max_ms.is_some() {
            let (min, max) = base
                .as_ref()
                .map_or((0, 0), |p| (p.jitter().min_ms(), p.jitter().max_ms()));
            builder = builder.jitter_ms(
                self.jitter_min_ms.unwrap_or(min),
                self.jitter_max_ms.unwrap_or(max),
            );
        }
        if let Some(rate) = self.failure_rate {
            builder = builder.failure_rate(rate);
        }
        if let Some(status) = self.failure_status {
            builder = builder.failure_status(status);
        }
        if let Some(body) = &self.failure_body {
            builder = builder.failure_body(body.clone().into_bytes());
        }
        if let Some(peak) = self.peak {
            builder = builder.peak(peak.start_hour, peak.end_hour, peak.failure_rate);
        }
        builder.build()
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document does not match the schema.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> { Ok(toml::from_str(contents)?) }

    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate every scenario and route, returning the compiled routes.
    ///
    /// # Errors
    ///
    /// Returns the first invalid entry as [`ConfigError::Scenario`] or
    /// [`ConfigError::Route`].
    pub fn validate(&self) -> Result<Vec<(RoutePattern, ConditionProfile)>, ConfigError> {
        for (index, scenario) in self.scenarios.iter().enumerate() {
            presets::scenario(&scenario.name)
                .map_err(|source| ConfigError::Scenario { index, source })?;
        }
        self.routes
            .iter()
            .enumerate()
            .map(|(index, route)| {
                let compiled = RoutePattern::new(&route.pattern)
                    .and_then(|pattern| Ok((pattern, route.profile()?)));
                compiled.map_err(|source| ConfigError::Route {
                    index,
                    pattern: route.pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Register everything on `session`: scenarios first, then routes, so an
    /// explicit route takes precedence over an overlapping scenario route.
    ///
    /// Returns the number of entries registered.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] before registering anything if any entry is
    /// invalid.
    pub fn apply(&self, session: &ScenarioSession) -> Result<usize, ConfigError> {
        let routes = self.validate()?;
        let mut registered = 0;
        for (index, scenario) in self.scenarios.iter().enumerate() {
            registered += session
                .apply_scenario(&scenario.name)
                .map_err(|source| ConfigError::Scenario { index, source })?;
        }
        for (index, (pattern, profile)) in routes.into_iter().enumerate() {
            session
                .register(pattern.as_str(), profile)
                .map_err(|source| ConfigError::Route {
                    index,
                    pattern: pattern.to_string(),
                    source,
                })?;
            registered += 1;
        }
        info!(session = %session.id(), registered, "configuration applied");
        Ok(registered)
    }

    /// Spawn the telemetry emitter described by `[telemetry]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Telemetry`] if the UDP sink cannot be set up.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub async fn spawn_telemetry(&self) -> Result<TelemetryEmitter, ConfigError> {
        let section = &self.telemetry;
        let emitter = match &section.udp_endpoint {
            Some(endpoint) => TelemetryEmitter::builder(
                UdpLineSink::connect(endpoint)
                    .await
                    .map_err(ConfigError::Telemetry)?,
            )
            .capacity(section.capacity)
            .environment(section.environment.clone())
            .spawn(),
            None => TelemetryEmitter::builder(TracingSink)
                .capacity(section.capacity)
                .environment(section.environment.clone())
                .spawn(),
        };
        Ok(emitter)
    }
}

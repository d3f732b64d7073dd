#![doc(html_root_url = "https://docs.rs/netcondition/latest")]
//! Public API for the `netcondition` library.
//!
//! This crate intercepts outbound requests matching route patterns and
//! degrades them with latency, jitter and probabilistic failures, emulating
//! adverse network and device conditions during resilience testing.

pub mod clock;
pub mod config;
pub mod dry_run;
pub mod entropy;
pub mod error;
pub mod hooks;
pub mod interceptor;
pub mod metrics;
pub mod middleware;
pub mod panic;
pub mod pattern;
pub mod prelude;
pub mod presets;
pub mod profile;
pub mod registry;
pub mod request;
pub mod response;
pub mod session;
pub mod telemetry;

pub use error::{AbortError, ConfigurationError, ForwardError, TelemetryError};
pub use interceptor::{ConditionLayer, InterceptorBuilder, Outcome, RequestInterceptor};
pub use metrics::{
    HANDLER_PANICS,
    INJECTED_DELAY_SECONDS,
    REGISTRY_ENTRIES,
    REQUESTS_TOTAL,
    TELEMETRY_DROPPED,
};
pub use pattern::RoutePattern;
pub use profile::{ConditionProfile, ProfileBuilder};
pub use registry::InterceptorRegistry;
pub use request::InterceptedRequest;
pub use response::{Response, ResponseOrigin};
pub use session::{ScenarioSession, SessionId};
pub use telemetry::{Measurement, TelemetryEmitter, TelemetrySink};

//! Optional convenience imports for common `netcondition` workflows.
//!
//! Prefer importing specialised APIs directly from their owning modules.
//!
//! # Examples
//!
//! ```rust,no_run
//! use netcondition::prelude::*;
//!
//! fn payday(registry: &InterceptorRegistry) -> Result<u64, ConfigurationError> {
//!     registry.register("**/api/payments/**", preset("peak-payday")?)
//! }
//! ```

pub use crate::{
    error::{AbortError, ConfigurationError},
    hooks::{FnHandler, HandlerDecision, RouteHandler},
    interceptor::RequestInterceptor,
    middleware::Service,
    presets::preset,
    profile::ConditionProfile,
    registry::InterceptorRegistry,
    request::InterceptedRequest,
    response::{Response, ResponseOrigin},
    session::ScenarioSession,
    telemetry::TelemetryEmitter,
};

//! Test doubles for driving a
//! [`RequestInterceptor`](netcondition::interceptor::RequestInterceptor)
//! without a network.
//!
//! Upstreams stand in for the real destination, sinks stand in for the
//! telemetry backend, and the logger fixture serialises `logtest` capture
//! across tests.
//!
//! ```rust
//! use netcondition::{interceptor::RequestInterceptor, request::InterceptedRequest};
//! use netcondition_testing::StaticUpstream;
//!
//! # async fn example() {
//! let upstream = StaticUpstream::ok();
//! let interceptor = RequestInterceptor::builder().build(upstream.clone());
//! let response = interceptor
//!     .handle(InterceptedRequest::get("/api/balance"))
//!     .await
//!     .expect("not aborted");
//! assert_eq!(response.status(), 200);
//! assert_eq!(upstream.calls(), 1);
//! # }
//! ```

pub mod logging;
pub mod metrics;
pub mod sinks;
pub mod upstream;

pub use logging::{LoggerHandle, logger};
pub use metrics::{RecordedMetric, counter_value, gauge_value, histogram_samples, with_debug_recorder};
pub use sinks::{FailingSink, RecordingSink, SlowSink};
pub use upstream::{StaticUpstream, UnreachableUpstream};

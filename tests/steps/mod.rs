//! Step definitions for condition injection behavioural tests.

mod injection_steps;
mod registry_steps;
mod session_steps;

//! Scheduler layer
//!
//! Prepares a run (readiness, authentication, token) and fans the
//! project pipelines out under the concurrency limiter.

pub mod bootstrap;
pub mod orchestrator;

pub use orchestrator::Orchestrator;

//! Core domain types
//!
//! These types are shared between the service client (which produces them
//! from API responses) and the runner (which drives pipelines with them).

pub mod credential;
pub mod metric;
pub mod project;
pub mod status;

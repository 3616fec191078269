//! SNQB Core
//!
//! Core types and abstractions for batch static-analysis runs.
//!
//! This crate contains:
//! - Domain types: project tasks, credentials, metric records and service states
//! - DTOs: response shapes of the analysis service API
//! - Retry: the bounded retry-with-delay primitive used by every fallible call

pub mod domain;
pub mod dto;
pub mod retry;

pub use retry::{Attempt, Backoff, RetryError, RetryPolicy};

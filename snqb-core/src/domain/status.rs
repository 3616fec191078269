//! Observed states of the analysis service and its projects
//!
//! None of these are stored; they are read off a single API call and
//! consumed by the retry loops around it.

use serde::{Deserialize, Serialize};

/// Readiness of the analysis service as reported by its status probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// Service answered but is not operational yet
    Starting,

    /// Service reported `UP`
    Up,

    /// Service could not be reached at all
    Unreachable,
}

impl ServiceStatus {
    /// Maps the `status` field of the probe response
    pub fn from_reported(status: &str) -> Self {
        if status == "UP" {
            ServiceStatus::Up
        } else {
            ServiceStatus::Starting
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, ServiceStatus::Up)
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Starting => write!(f, "Starting"),
            ServiceStatus::Up => write!(f, "Up"),
            ServiceStatus::Unreachable => write!(f, "Unreachable"),
        }
    }
}

/// Whether a project is registered on the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present)
    }
}

/// Result of registering a project on the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateOutcome {
    Created,

    /// The key was already registered, usually by an earlier interrupted run
    AlreadyExists,

    /// The service refused the registration
    Failed { status: u16, message: String },
}

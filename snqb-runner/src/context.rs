//! Run context
//!
//! Immutable state established once while bootstrapping a run and handed
//! to every pipeline. Nothing in here changes after the run starts.

use chrono::{DateTime, Utc};
use snqb_core::domain::credential::ServiceCredential;
use std::sync::Arc;
use uuid::Uuid;

/// Shared, read-only state of one batch run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier of this run, used to correlate logs and name the token
    pub run_id: Uuid,

    /// Analysis token shared by every scanner invocation
    pub credential: Arc<ServiceCredential>,

    /// When bootstrap finished
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(run_id: Uuid, credential: ServiceCredential) -> Self {
        Self {
            run_id,
            credential: Arc::new(credential),
            started_at: Utc::now(),
        }
    }

    /// Token passed to the scanner
    pub fn token(&self) -> &str {
        &self.credential.token
    }
}

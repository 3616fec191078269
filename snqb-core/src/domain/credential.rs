//! Analysis credential

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token issued by the analysis service for scanner authentication
///
/// Issued once per run and shared read-only by every pipeline.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceCredential {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl ServiceCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
        }
    }
}

// Keep tokens out of logs
impl std::fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

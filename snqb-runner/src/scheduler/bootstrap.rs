//! Run bootstrap
//!
//! Waits for the analysis service, logs in and issues the analysis token
//! shared by the whole run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::context::RunContext;
use crate::service::AnalysisService;

/// Readiness, login and token issuance, in that order
///
/// No token is requested before a successful login. A failed readiness
/// wait, login or token request is fatal to the run.
pub async fn bootstrap(service: &dyn AnalysisService, startup_grace: Duration) -> Result<RunContext> {
    if !startup_grace.is_zero() {
        info!(
            "Waiting {:?} for the analysis service to boot",
            startup_grace
        );
        tokio::time::sleep(startup_grace).await;
    }

    service.wait_until_ready().await?;

    service
        .login()
        .await
        .context("Run cannot start without a successful login")?;

    let run_id = Uuid::new_v4();
    let credential = service
        .issue_token(&token_name(run_id, Utc::now()))
        .await
        .context("Run cannot start without an analysis token")?;

    info!("Run {} bootstrapped", run_id);
    Ok(RunContext::new(run_id, credential))
}

/// Token names must be unique per user on the service
fn token_name(run_id: Uuid, now: DateTime<Utc>) -> String {
    let run = run_id.simple().to_string();
    format!(
        "snqb_analysis_{}_{}",
        now.format("%Y%m%d%H%M%S"),
        &run[..8]
    )
}

//! SNQB Runner
//!
//! Runs static analysis over a batch of projects and stores the resulting
//! quality metrics.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Services: Analysis service operations and the per-project pipeline
//! - Scanner: Isolated scanner invocations with retry
//! - Storage: SQLite metric table with upsert semantics
//! - Scheduler: Bootstrap and bounded fan-out of project pipelines
//!
//! The runner starts a fresh analysis service, waits until it is
//! operational, scans every project directory under the scan root, and
//! tears the service down at the end.

mod config;
mod context;
mod discovery;
mod lifecycle;
mod limiter;
mod scanner;
mod scheduler;
mod service;
mod storage;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::lifecycle::{ComposeLifecycle, ServiceLifecycle};
use crate::scanner::ComposeProcess;
use crate::scheduler::Orchestrator;
use crate::service::SonarAnalysisService;
use crate::storage::MetricStore;
use snqb_client::SonarClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snqb_runner=info,snqb_client=info,snqb_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SNQB Runner");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: sonar_url={}, scan_root={}, database={}",
        config.sonar_url,
        config.scan_root.display(),
        config.database_path.display()
    );

    let lifecycle: Arc<dyn ServiceLifecycle> =
        Arc::new(ComposeLifecycle::new(config.compose.clone()));
    if let Err(e) = lifecycle.start().await {
        // Readiness polling decides whether the run can go on
        warn!("Could not start the analysis service: {:#}", e);
    }

    // Anything failing before the orchestrator runs still has to tear down
    let prepared = prepare(&config).await;
    let (store, projects) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("Run preparation failed: {:#}", e);
            if let Err(e) = lifecycle.teardown().await {
                warn!("Teardown failed: {:#}", e);
            }
            return Err(e);
        }
    };
    info!("Found {} project(s): {:?}", projects.len(), projects);

    let client = SonarClient::new(
        config.sonar_url.clone(),
        config.username.clone(),
        config.password.clone(),
    );
    let service = Arc::new(SonarAnalysisService::new(
        client,
        config.username.clone(),
        config.password.clone(),
        config.retries.clone(),
    ));
    let process = Arc::new(ComposeProcess::new(config.compose.clone()));

    let orchestrator = Orchestrator::new(
        config,
        service,
        process,
        store.clone(),
        lifecycle,
    );
    let report = orchestrator.run(projects).await;

    match store.count().await {
        Ok(count) => info!("Metric table holds {} record(s)", count),
        Err(e) => warn!("Could not count stored metrics: {}", e),
    }
    store.close().await;

    if let Some(fatal) = &report.fatal {
        anyhow::bail!("Run aborted: {}", fatal);
    }

    if !report.is_success() {
        for failure in &report.failed {
            warn!("Project {} was not analyzed: {}", failure.project_id, failure.error);
        }
    }

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            info!("Failed to load config from environment ({}), using defaults", e);
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Opens the metric store and lists the projects to scan
async fn prepare(config: &Config) -> Result<(Arc<MetricStore>, Vec<String>)> {
    let store = MetricStore::connect(&config.database_path).await?;
    store
        .create_schema()
        .await
        .context("Failed to create the metric table")?;

    let projects = discovery::discover_projects(&config.scan_root)?;

    Ok((Arc::new(store), projects))
}

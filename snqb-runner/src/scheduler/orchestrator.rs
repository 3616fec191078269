//! Orchestrator
//!
//! Drives one full run:
//! 1. Bootstrap (readiness, login, token)
//! 2. Build the project tasks
//! 3. Run every pipeline under the concurrency limiter, reporting progress
//!    in completion order
//! 4. Tear the analysis service down, whatever happened before
//!
//! A failing project is reported and does not affect its siblings.

use anyhow::Result;
use chrono::Utc;
use snqb_core::domain::project::ProjectTask;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::lifecycle::ServiceLifecycle;
use crate::limiter::ConcurrencyLimiter;
use crate::scanner::{ScanProcess, ScannerRunner};
use crate::scheduler::bootstrap::bootstrap;
use crate::service::{AnalysisService, PipelineReport, ProjectPipeline};
use crate::storage::MetricSink;

/// A project whose pipeline ended with an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFailure {
    pub project_id: String,
    pub error: String,
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Projects handed to the limiter
    pub total: usize,

    /// Pipelines that finished, successfully or not
    pub completed: usize,

    /// Ids of the projects whose metrics were stored
    pub succeeded: Vec<String>,

    pub failed: Vec<ProjectFailure>,

    /// Error that stopped the run before or during fan-out
    pub fatal: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.failed.is_empty()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} completed ({} succeeded, {} failed)",
            self.completed,
            self.total,
            self.succeeded.len(),
            self.failed.len()
        )?;
        if let Some(ref fatal) = self.fatal {
            write!(f, ", run aborted: {}", fatal)?;
        }
        Ok(())
    }
}

/// Top-level driver of a batch run
pub struct Orchestrator {
    config: Config,
    service: Arc<dyn AnalysisService>,
    process: Arc<dyn ScanProcess>,
    sink: Arc<dyn MetricSink>,
    lifecycle: Arc<dyn ServiceLifecycle>,
}

impl Orchestrator {
    /// # Arguments
    /// * `config` - Run configuration (scan root, budgets, parallelism)
    /// * `service` - Analysis service operations
    /// * `process` - Single scanner invocation
    /// * `sink` - Metric destination
    /// * `lifecycle` - Teardown of the analysis service
    pub fn new(
        config: Config,
        service: Arc<dyn AnalysisService>,
        process: Arc<dyn ScanProcess>,
        sink: Arc<dyn MetricSink>,
        lifecycle: Arc<dyn ServiceLifecycle>,
    ) -> Self {
        Self {
            config,
            service,
            process,
            sink,
            lifecycle,
        }
    }

    /// Runs every project in `project_names`, then tears the service down
    ///
    /// Never fails: run-level errors end up in [`RunReport::fatal`],
    /// project errors in [`RunReport::failed`].
    pub async fn run(&self, project_names: Vec<String>) -> RunReport {
        let mut report = RunReport::default();

        if let Err(e) = self.execute(project_names, &mut report).await {
            error!("Run failed: {:#}", e);
            report.fatal = Some(format!("{:#}", e));
        }

        self.teardown().await;

        info!("Run finished: {}", report);
        report
    }

    async fn execute(&self, project_names: Vec<String>, report: &mut RunReport) -> Result<()> {
        let context = bootstrap(self.service.as_ref(), self.config.startup_grace).await?;
        let (run_id, started_at) = (context.run_id, context.started_at);

        let tasks = ProjectTask::batch(project_names)?;
        info!(
            "Scanning {} project(s), at most {} at a time",
            tasks.len(),
            self.config.max_parallel_projects
        );

        let scanner = ScannerRunner::new(
            Arc::clone(&self.process),
            self.config.retries.scanner,
            self.config.scanner_host_url.clone(),
            self.config.scanner_exclusions.clone(),
        );
        let pipeline = Arc::new(ProjectPipeline::new(
            Arc::clone(&self.service),
            scanner,
            Arc::clone(&self.sink),
            context,
            self.config.scan_root.clone(),
        ));
        let limiter = ConcurrencyLimiter::new(self.config.max_parallel_projects);
        debug!("Limiter admits {} pipeline(s)", limiter.bound());

        let mut pipelines = JoinSet::new();
        let mut project_ids = HashMap::with_capacity(tasks.len());
        for task in tasks {
            let pipeline = Arc::clone(&pipeline);
            let limiter = limiter.clone();
            let project_id = task.id.clone();

            let handle = pipelines.spawn(async move {
                // The permit is held for the whole pipeline and dropped on any exit
                let result = match limiter.acquire().await {
                    Ok(_permit) => pipeline.run(&task).await,
                    Err(e) => Err(e),
                };
                (task.id, result)
            });
            project_ids.insert(handle.id(), project_id);
        }

        report.total = pipelines.len();

        while let Some(joined) = pipelines.join_next_with_id().await {
            report.completed += 1;
            let joined = match joined {
                Ok((_, outcome)) => Ok(outcome),
                Err(e) => {
                    let project_id = project_ids
                        .remove(&e.id())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    Err((project_id, e))
                }
            };
            self.record(joined, report);
            info!(
                "Progress: {}/{} projects completed",
                report.completed, report.total
            );
        }

        info!(
            "Run {} processed all projects in {}s",
            run_id,
            (Utc::now() - started_at).num_seconds()
        );
        Ok(())
    }

    fn record(
        &self,
        joined: Result<(String, Result<PipelineReport>), (String, JoinError)>,
        report: &mut RunReport,
    ) {
        match joined {
            Ok((project_id, Ok(pipeline))) => {
                debug!(
                    "Project {} stored {} metric(s)",
                    pipeline.project_id, pipeline.records_persisted
                );
                report.succeeded.push(project_id);
            }
            Ok((project_id, Err(e))) => {
                error!("Project {} failed: {:#}", project_id, e);
                report.failed.push(ProjectFailure {
                    project_id,
                    error: format!("{:#}", e),
                });
            }
            Err((project_id, e)) => {
                error!("Pipeline of project {} panicked: {}", project_id, e);
                report.failed.push(ProjectFailure {
                    project_id,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn teardown(&self) {
        if let Err(e) = self.lifecycle.teardown().await {
            warn!("Teardown failed: {:#}", e);
        }
    }
}

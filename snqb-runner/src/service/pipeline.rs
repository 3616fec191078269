//! Project pipeline
//!
//! Carries one project through its five stages, strictly in order:
//! Register → Scan → Collect → Persist → Deregister.
//!
//! Each stage retries internally as far as its own budget allows. The
//! first stage that fails ends the pipeline; later stages do not run.

use anyhow::{Context, Result, bail};
use snqb_client::MetricsOutcome;
use snqb_core::domain::metric::{METRIC_KEYS, MetricRecord};
use snqb_core::domain::project::ProjectTask;
use snqb_core::domain::status::CreateOutcome;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::scanner::ScannerRunner;
use crate::service::analysis::AnalysisService;
use crate::storage::MetricSink;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Register,
    Scan,
    Collect,
    Persist,
    Deregister,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Register => write!(f, "Register"),
            Stage::Scan => write!(f, "Scan"),
            Stage::Collect => write!(f, "Collect"),
            Stage::Persist => write!(f, "Persist"),
            Stage::Deregister => write!(f, "Deregister"),
        }
    }
}

/// Summary of a completed pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub project_id: String,
    pub records_persisted: u64,
}

/// Per-project pipeline
pub struct ProjectPipeline {
    service: Arc<dyn AnalysisService>,
    scanner: ScannerRunner,
    sink: Arc<dyn MetricSink>,
    context: RunContext,
    scan_root: PathBuf,
    metric_keys: Vec<&'static str>,
}

impl ProjectPipeline {
    /// # Arguments
    /// * `service` - Analysis service operations
    /// * `scanner` - Scanner invocation with retry
    /// * `sink` - Destination of the collected metrics
    /// * `context` - Shared state of the run
    /// * `scan_root` - Directory holding one sub-directory per project
    pub fn new(
        service: Arc<dyn AnalysisService>,
        scanner: ScannerRunner,
        sink: Arc<dyn MetricSink>,
        context: RunContext,
        scan_root: PathBuf,
    ) -> Self {
        Self {
            service,
            scanner,
            sink,
            context,
            scan_root,
            metric_keys: METRIC_KEYS.to_vec(),
        }
    }

    /// Directory holding the sources of `task`
    pub fn source_dir(&self, task: &ProjectTask) -> PathBuf {
        self.scan_root.join(&task.name)
    }

    /// Runs every stage for `task`
    ///
    /// # Errors
    /// The error of the first failing stage, prefixed with the stage name
    /// and project id.
    pub async fn run(&self, task: &ProjectTask) -> Result<PipelineReport> {
        info!("Starting pipeline for project {}", task.id);

        self.register(task)
            .await
            .with_context(|| stage_failed(Stage::Register, task))?;

        let source_dir = self.source_dir(task);
        self.scan(task, &source_dir)
            .await
            .with_context(|| stage_failed(Stage::Scan, task))?;

        let records = self
            .collect(task)
            .await
            .with_context(|| stage_failed(Stage::Collect, task))?;

        let persisted = self
            .persist(task, &records)
            .await
            .with_context(|| stage_failed(Stage::Persist, task))?;

        self.deregister(task)
            .await
            .with_context(|| stage_failed(Stage::Deregister, task))?;

        info!(
            "Pipeline for project {} completed ({} metrics stored)",
            task.id, persisted
        );
        Ok(PipelineReport {
            project_id: task.id.clone(),
            records_persisted: persisted,
        })
    }

    async fn register(&self, task: &ProjectTask) -> Result<()> {
        debug!("[{}] {}", task.id, Stage::Register);

        match self.service.create_project(task).await? {
            CreateOutcome::Created => Ok(()),
            CreateOutcome::AlreadyExists => {
                warn!(
                    "Project {} was already registered, its analysis will be replaced",
                    task.id
                );
                Ok(())
            }
            CreateOutcome::Failed { status, message } => {
                bail!(
                    "service refused to register the project (status {}): {}",
                    status,
                    message
                )
            }
        }
    }

    async fn scan(&self, task: &ProjectTask, source_dir: &Path) -> Result<()> {
        debug!("[{}] {}", task.id, Stage::Scan);
        self.scanner.run(task, source_dir, &self.context).await
    }

    async fn collect(&self, task: &ProjectTask) -> Result<Vec<MetricRecord>> {
        debug!("[{}] {}", task.id, Stage::Collect);

        match self.service.fetch_metrics(task, &self.metric_keys).await? {
            MetricsOutcome::Measures(measures) => {
                let records = MetricRecord::from_measures(&task.id, &measures);
                if records.len() < measures.len() {
                    debug!(
                        "Skipped {} measure(s) without a value for project {}",
                        measures.len() - records.len(),
                        task.id
                    );
                }
                Ok(records)
            }
            MetricsOutcome::Rejected { status, body } => {
                bail!("metrics request rejected (status {}): {}", status, body)
            }
        }
    }

    async fn persist(&self, task: &ProjectTask, records: &[MetricRecord]) -> Result<u64> {
        debug!("[{}] {}", task.id, Stage::Persist);
        self.sink.persist(records).await
    }

    async fn deregister(&self, task: &ProjectTask) -> Result<()> {
        debug!("[{}] {}", task.id, Stage::Deregister);
        self.service.delete_project(task).await
    }
}

fn stage_failed(stage: Stage, task: &ProjectTask) -> String {
    format!("{} stage failed for project {}", stage, task.id)
}

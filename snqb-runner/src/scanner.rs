//! Scanner invocation
//!
//! Runs the external scanner for one project:
//! - Mounting the project's sources read-only into an isolated container
//! - Passing project key, name, service URL and analysis token
//! - Retrying the whole invocation until it exits with code 0
//!
//! Every retry re-submits a full analysis; the service overwrites the
//! previous one for the same project key.

use anyhow::{Context, Result};
use async_trait::async_trait;
use snqb_core::domain::project::ProjectTask;
use snqb_core::{Attempt, RetryPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ComposeSettings;
use crate::context::RunContext;

/// Everything one scanner invocation needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub project_key: String,
    pub project_name: String,
    pub source_dir: PathBuf,
    pub host_url: String,
    pub token: String,
    pub exclusions: String,
}

impl ScanRequest {
    /// Analysis properties passed to the scanner as `-D` flags
    pub fn properties(&self) -> Vec<String> {
        vec![
            format!("-Dsonar.projectKey={}", self.project_key),
            format!("-Dsonar.projectName={}", self.project_name),
            format!("-Dsonar.sources={}", self.project_name),
            format!("-Dsonar.host.url={}", self.host_url),
            format!("-Dsonar.login={}", self.token),
            format!("-Dsonar.exclusions={}", self.exclusions),
        ]
    }
}

/// Captured result of one scanner process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ScanOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// One invocation of the scanner process
///
/// Returns `Err` only when the process could not be launched.
#[async_trait]
pub trait ScanProcess: Send + Sync {
    async fn invoke(&self, request: &ScanRequest) -> Result<ScanOutput>;
}

/// Runs the scanner as a one-off compose service container
pub struct ComposeProcess {
    settings: ComposeSettings,
}

impl ComposeProcess {
    pub fn new(settings: ComposeSettings) -> Self {
        Self { settings }
    }

    /// Full argument list, e.g.
    /// `compose run --rm -v <dir>:/usr/src/<name>:ro sonar-scanner-cli -Dsonar.projectKey=...`
    pub fn command_args(&self, request: &ScanRequest) -> Vec<String> {
        let mount = format!(
            "{}:{}/{}:ro",
            mount_source(&request.source_dir).display(),
            self.settings.mount_root,
            request.project_name
        );

        let mut args = self.settings.base_args.clone();
        args.extend([
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            mount,
            self.settings.scanner_service.clone(),
        ]);
        args.extend(request.properties());
        args
    }
}

/// Bind mounts need an absolute host path; anything else is read as a volume name
fn mount_source(source_dir: &Path) -> PathBuf {
    std::path::absolute(source_dir).unwrap_or_else(|_| source_dir.to_path_buf())
}

#[async_trait]
impl ScanProcess for ComposeProcess {
    async fn invoke(&self, request: &ScanRequest) -> Result<ScanOutput> {
        let output = Command::new(&self.settings.program)
            .args(self.command_args(request))
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| {
                format!(
                    "Failed to launch scanner via '{}' for project {}",
                    self.settings.program, request.project_key
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.trim().is_empty() {
            debug!("scanner stdout ({}): {}", request.project_key, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("scanner stderr ({}): {}", request.project_key, stderr.trim());
        }

        Ok(ScanOutput {
            exit_code: output.status.code(),
            stderr,
        })
    }
}

/// Scanner invocation with retry
pub struct ScannerRunner {
    process: Arc<dyn ScanProcess>,
    policy: RetryPolicy,
    host_url: String,
    exclusions: String,
}

impl ScannerRunner {
    /// # Arguments
    /// * `process` - How a single scanner invocation is performed
    /// * `policy` - Attempt budget and delay between full invocations
    /// * `host_url` - Service URL as seen by the scanner
    /// * `exclusions` - Source exclusion filter
    pub fn new(
        process: Arc<dyn ScanProcess>,
        policy: RetryPolicy,
        host_url: impl Into<String>,
        exclusions: impl Into<String>,
    ) -> Self {
        Self {
            process,
            policy,
            host_url: host_url.into(),
            exclusions: exclusions.into(),
        }
    }

    /// Builds the invocation for `task` with sources at `source_dir`
    pub fn request_for(&self, task: &ProjectTask, source_dir: &Path, context: &RunContext) -> ScanRequest {
        ScanRequest {
            project_key: task.id.clone(),
            project_name: task.name.clone(),
            source_dir: source_dir.to_path_buf(),
            host_url: self.host_url.clone(),
            token: context.token().to_string(),
            exclusions: self.exclusions.clone(),
        }
    }

    /// Scans `task`, retrying failed invocations
    ///
    /// # Errors
    /// Fails once the attempt budget is exhausted; the error names the project.
    pub async fn run(&self, task: &ProjectTask, source_dir: &Path, context: &RunContext) -> Result<()> {
        let request = self.request_for(task, source_dir, context);
        info!(
            "Running scanner for project '{}' at '{}'",
            task.id,
            source_dir.display()
        );

        let operation = format!("scan of project '{}'", task.id);
        self.policy
            .run(&operation, |_| self.scan_attempt(&request))
            .await?;

        info!("Scanner finished for project '{}'", task.id);
        Ok(())
    }

    async fn scan_attempt(&self, request: &ScanRequest) -> std::io::Result<Attempt<()>> {
        match self.process.invoke(request).await {
            Ok(output) if output.success() => Ok(Attempt::Done(())),
            Ok(output) => {
                let code = output
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                warn!(
                    "Scanner failed for project '{}' with exit code {}: {}",
                    request.project_key,
                    code,
                    output.stderr.trim()
                );
                Ok(Attempt::Retry(format!("scanner exited with code {}", code)))
            }
            Err(e) => Ok(Attempt::Retry(format!("{:#}", e))),
        }
    }
}

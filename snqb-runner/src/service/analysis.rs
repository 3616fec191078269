//! Analysis service
//!
//! The operations a run needs from the analysis service, with the retry
//! budgets of the run already applied.

use anyhow::{Context, Result};
use async_trait::async_trait;
use snqb_client::{MetricsOutcome, SonarClient};
use snqb_core::domain::credential::ServiceCredential;
use snqb_core::domain::project::ProjectTask;
use snqb_core::domain::status::{CreateOutcome, ServiceStatus};

use crate::config::RetryBudgets;

/// Service trait for everything a run asks of the analysis service
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Blocks until the service reports `UP`; fails once the readiness budget is spent
    async fn wait_until_ready(&self) -> Result<ServiceStatus>;

    /// Opens an administrative session; fails once the login budget is spent
    async fn login(&self) -> Result<()>;

    /// Issues a new analysis token named `name`
    async fn issue_token(&self, name: &str) -> Result<ServiceCredential>;

    /// Registers the project of `task`
    async fn create_project(&self, task: &ProjectTask) -> Result<CreateOutcome>;

    /// Polls the computed measures of `task`
    async fn fetch_metrics(&self, task: &ProjectTask, metric_keys: &[&str]) -> Result<MetricsOutcome>;

    /// Removes the project of `task` and confirms it is gone
    async fn delete_project(&self, task: &ProjectTask) -> Result<()>;
}

/// [`AnalysisService`] backed by the HTTP client
pub struct SonarAnalysisService {
    client: SonarClient,
    username: String,
    password: String,
    retries: RetryBudgets,
}

impl SonarAnalysisService {
    pub fn new(
        client: SonarClient,
        username: impl Into<String>,
        password: impl Into<String>,
        retries: RetryBudgets,
    ) -> Self {
        Self {
            client,
            username: username.into(),
            password: password.into(),
            retries,
        }
    }
}

#[async_trait]
impl AnalysisService for SonarAnalysisService {
    async fn wait_until_ready(&self) -> Result<ServiceStatus> {
        self.client
            .wait_until_ready(&self.retries.readiness)
            .await
            .context("Analysis service did not become operational in time")
    }

    async fn login(&self) -> Result<()> {
        self.client
            .login_with_retry(&self.username, &self.password, &self.retries.login)
            .await
            .with_context(|| format!("Login as '{}' failed", self.username))
    }

    async fn issue_token(&self, name: &str) -> Result<ServiceCredential> {
        self.client
            .issue_token(name)
            .await
            .context("Failed to obtain an analysis token")
    }

    async fn create_project(&self, task: &ProjectTask) -> Result<CreateOutcome> {
        self.client
            .create_project(&task.id, &task.id)
            .await
            .with_context(|| format!("Failed to send registration of project {}", task.id))
    }

    async fn fetch_metrics(&self, task: &ProjectTask, metric_keys: &[&str]) -> Result<MetricsOutcome> {
        self.client
            .fetch_metrics(&task.id, metric_keys, &self.retries.metrics)
            .await
            .with_context(|| format!("Failed to gather metrics for project {}", task.id))
    }

    async fn delete_project(&self, task: &ProjectTask) -> Result<()> {
        self.client
            .delete_project(
                &task.id,
                &task.name,
                &self.retries.presence,
                &self.retries.delete,
            )
            .await
            .with_context(|| format!("Failed to delete project {}", task.id))
    }
}

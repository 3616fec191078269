//! Project endpoints: register, search and delete

use reqwest::StatusCode;
use snqb_core::domain::status::{CreateOutcome, Presence};
use snqb_core::dto::ProjectSearch;
use snqb_core::{Attempt, RetryPolicy};
use tracing::{debug, info, warn};

use crate::SonarClient;
use crate::error::Result;

impl SonarClient {
    // =============================================================================
    // Registration
    // =============================================================================

    /// Register a project under `key`
    ///
    /// A refusal by the service is returned as [`CreateOutcome::Failed`]
    /// rather than an error; only transport failures are errors.
    pub async fn create_project(&self, key: &str, name: &str) -> Result<CreateOutcome> {
        let url = self.url("/api/projects/create");
        let response = self
            .authed(self.client.post(&url))
            .form(&[("name", name), ("project", key)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            info!("Project '{}' created", key);
            return Ok(CreateOutcome::Created);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == StatusCode::BAD_REQUEST && message.contains("already exists") {
            warn!("Project '{}' already exists, reusing it", key);
            return Ok(CreateOutcome::AlreadyExists);
        }

        warn!(
            "Failed to create project '{}' (status {}): {}",
            key, status, message
        );
        Ok(CreateOutcome::Failed {
            status: status.as_u16(),
            message,
        })
    }

    // =============================================================================
    // Existence
    // =============================================================================

    /// Search for `key` once
    pub async fn project_presence(&self, key: &str) -> Result<Presence> {
        let url = self.url("/api/projects/search");
        let response = self
            .authed(self.client.get(&url))
            .query(&[("projects", key)])
            .send()
            .await?;

        let search: ProjectSearch = self.handle_response(response).await?;

        if search.components.iter().any(|c| c.key == key) {
            Ok(Presence::Present)
        } else {
            Ok(Presence::Absent)
        }
    }

    /// Check whether `key` is registered, retrying failed searches
    ///
    /// # Errors
    /// [`crate::ClientError::RetriesExhausted`] when no search succeeded within the budget.
    pub async fn project_exists(&self, key: &str, policy: &RetryPolicy) -> Result<bool> {
        let operation = format!("existence check of project '{}'", key);
        let presence = policy
            .run(&operation, |_| self.presence_attempt(key))
            .await?;

        Ok(presence.is_present())
    }

    async fn presence_attempt(&self, key: &str) -> Result<Attempt<Presence>> {
        match self.project_presence(key).await {
            Ok(presence) => Ok(Attempt::Done(presence)),
            Err(e) => Ok(Attempt::Retry(e.to_string())),
        }
    }

    // =============================================================================
    // Removal
    // =============================================================================

    /// Delete `key` and wait until the service no longer lists it
    ///
    /// Does nothing if the project is not registered. A delete that is
    /// acknowledged while the project is still listed is re-issued.
    ///
    /// # Arguments
    /// * `key` - Project key
    /// * `name` - Project display name
    /// * `presence_policy` - Budget of every existence check
    /// * `delete_policy` - Budget of delete requests
    pub async fn delete_project(
        &self,
        key: &str,
        name: &str,
        presence_policy: &RetryPolicy,
        delete_policy: &RetryPolicy,
    ) -> Result<()> {
        if !self.project_exists(key, presence_policy).await? {
            info!("Project '{}' is not registered, nothing to delete", key);
            return Ok(());
        }

        let operation = format!("delete of project '{}'", key);
        delete_policy
            .run(&operation, |_| self.delete_attempt(key, name, presence_policy))
            .await?;

        info!("Project '{}' deleted", key);
        Ok(())
    }

    async fn delete_attempt(
        &self,
        key: &str,
        name: &str,
        presence_policy: &RetryPolicy,
    ) -> Result<Attempt<()>> {
        if let Err(e) = self.request_delete(key, name).await {
            return Ok(Attempt::Retry(e.to_string()));
        }

        if self.project_exists(key, presence_policy).await? {
            debug!("Project '{}' still listed after delete", key);
            Ok(Attempt::Retry("project still present after delete".to_string()))
        } else {
            Ok(Attempt::Done(()))
        }
    }

    async fn request_delete(&self, key: &str, name: &str) -> Result<()> {
        let url = self.url("/api/projects/delete");
        let response = self
            .authed(self.client.post(&url))
            .form(&[("name", name), ("project", key)])
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

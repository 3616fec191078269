//! System endpoints: readiness, login and token issuance

use snqb_core::domain::credential::ServiceCredential;
use snqb_core::domain::status::ServiceStatus;
use snqb_core::dto::{GeneratedToken, SystemStatus};
use snqb_core::{Attempt, RetryPolicy};
use tracing::{debug, info, warn};

use crate::SonarClient;
use crate::error::{ClientError, Result};

/// Token type accepted by the scanner for project analysis
const ANALYSIS_TOKEN_TYPE: &str = "GLOBAL_ANALYSIS_TOKEN";

impl SonarClient {
    // =============================================================================
    // Readiness
    // =============================================================================

    /// Probe the status endpoint once
    ///
    /// Never fails: transport errors map to [`ServiceStatus::Unreachable`],
    /// and non-200 or non-JSON answers to [`ServiceStatus::Starting`].
    pub async fn probe_status(&self) -> ServiceStatus {
        let url = self.url("/api/system/status");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Analysis service not reachable: {}", e);
                return ServiceStatus::Unreachable;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!("Unexpected status code {} from status probe", status);
            return ServiceStatus::Starting;
        }

        match response.json::<SystemStatus>().await {
            Ok(body) => {
                let reported = ServiceStatus::from_reported(&body.status);
                if !reported.is_up() {
                    debug!("Analysis service reports status {}", body.status);
                }
                reported
            }
            Err(e) => {
                debug!("Received non-JSON status response: {}", e);
                ServiceStatus::Starting
            }
        }
    }

    /// Poll the status endpoint until the service reports `UP`
    ///
    /// # Errors
    /// [`ClientError::RetriesExhausted`] once the policy's budget is spent.
    pub async fn wait_until_ready(&self, policy: &RetryPolicy) -> Result<ServiceStatus> {
        let status = policy
            .run("wait for analysis service", |_| self.readiness_attempt())
            .await?;

        info!("Analysis service is operational");
        Ok(status)
    }

    async fn readiness_attempt(&self) -> Result<Attempt<ServiceStatus>> {
        let status = self.probe_status().await;
        if status.is_up() {
            Ok(Attempt::Done(status))
        } else {
            Ok(Attempt::Retry(format!("service is {}", status)))
        }
    }

    // =============================================================================
    // Authentication
    // =============================================================================

    /// Open an administrative session with the given credentials
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = self.url("/api/authentication/login");
        let response = self
            .client
            .post(&url)
            .form(&[("login", username), ("password", password)])
            .send()
            .await?;

        self.handle_empty_response(response).await?;

        debug!("Logged in as {}", username);
        Ok(())
    }

    /// Log in, retrying refused or failed attempts
    ///
    /// # Errors
    /// [`ClientError::RetriesExhausted`] when no attempt succeeded within the budget.
    pub async fn login_with_retry(
        &self,
        username: &str,
        password: &str,
        policy: &RetryPolicy,
    ) -> Result<()> {
        let operation = format!("login as '{}'", username);
        policy
            .run(&operation, |_| self.login_attempt(username, password))
            .await?;

        info!("Logged in as {}", username);
        Ok(())
    }

    async fn login_attempt(&self, username: &str, password: &str) -> Result<Attempt<()>> {
        match self.login(username, password).await {
            Ok(()) => Ok(Attempt::Done(())),
            Err(e) => Ok(Attempt::Retry(e.to_string())),
        }
    }

    /// Request a fresh global analysis token
    ///
    /// Each call issues a new token; callers cache the result for the run.
    pub async fn issue_token(&self, name: &str) -> Result<ServiceCredential> {
        let url = self.url("/api/user_tokens/generate");
        let response = self
            .authed(self.client.post(&url))
            .form(&[("name", name), ("type", ANALYSIS_TOKEN_TYPE)])
            .send()
            .await?;

        let generated: GeneratedToken = match self.handle_response(response).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!("Token issuance failed: {}", e);
                return Err(e);
            }
        };

        if generated.token.is_empty() {
            return Err(ClientError::ParseError(
                "Token response carried an empty token".to_string(),
            ));
        }

        info!("Analysis token '{}' issued", name);
        Ok(ServiceCredential::new(generated.token))
    }
}

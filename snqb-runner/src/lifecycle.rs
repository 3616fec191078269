//! Analysis service lifecycle
//!
//! Starting and stopping the containerized analysis service is delegated
//! to compose. The run only needs two things from it: a fresh service at
//! start, and a best-effort teardown at the end.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ComposeSettings;

#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Brings up a clean instance of the analysis service
    async fn start(&self) -> Result<()>;

    /// Stops the service and removes its containers and volumes
    async fn teardown(&self) -> Result<()>;
}

/// Lifecycle driven through `docker compose`
pub struct ComposeLifecycle {
    settings: ComposeSettings,
}

impl ComposeLifecycle {
    pub fn new(settings: ComposeSettings) -> Self {
        Self { settings }
    }

    /// Arguments for a compose subcommand, base arguments included
    pub fn args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args = self.settings.base_args.clone();
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    async fn compose(&self, subcommand: &[&str]) -> Result<()> {
        let args = self.args(subcommand);
        debug!("Running {} {}", self.settings.program, args.join(" "));

        let output = Command::new(&self.settings.program)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to execute '{}'", self.settings.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "'{} {}' failed with exit code {}: {}",
                self.settings.program,
                args.join(" "),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(())
    }

    async fn down(&self) -> Result<()> {
        self.compose(&["down", "--remove-orphans", "--volumes"]).await
    }
}

#[async_trait]
impl ServiceLifecycle for ComposeLifecycle {
    async fn start(&self) -> Result<()> {
        // Leftovers of an interrupted run would keep stale projects around
        if let Err(e) = self.down().await {
            warn!("Failed to reset previous analysis service: {:#}", e);
        }

        self.compose(&["up", self.settings.service.as_str(), "-d"])
            .await
            .context("Failed to start the analysis service")?;

        info!("Analysis service '{}' started", self.settings.service);
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        self.down()
            .await
            .context("Failed to tear down the analysis service")?;

        info!("Analysis service '{}' torn down", self.settings.service);
        Ok(())
    }
}

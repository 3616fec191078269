//! Runner configuration
//!
//! Defines all configurable parameters of a batch run: where the analysis
//! service lives, which credentials to use, where projects and results are
//! found on disk, and the retry budget of every retrying call site.

use snqb_core::RetryPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::limiter::DEFAULT_PARALLEL_PROJECTS;

/// Retry budgets of every call that can fail transiently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudgets {
    /// Status probes while the service boots
    pub readiness: RetryPolicy,

    /// Login attempts once the service is up
    pub login: RetryPolicy,

    /// Full scanner invocations per project
    pub scanner: RetryPolicy,

    /// Project searches (existence checks)
    pub presence: RetryPolicy,

    /// Delete requests per project
    pub delete: RetryPolicy,

    /// Measure polls per project.
    ///
    /// Measures only appear once the service has processed the uploaded
    /// analysis. There is no run-level deadline, so this budget is the
    /// effective per-project timeout (about seven hours by default).
    pub metrics: RetryPolicy,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            readiness: RetryPolicy::fixed(1800, Duration::from_secs(1)),
            login: RetryPolicy::fixed(10, Duration::from_secs(2)),
            scanner: RetryPolicy::fixed(5, Duration::from_secs(2)),
            presence: RetryPolicy::fixed(20, Duration::from_secs(2)),
            delete: RetryPolicy::fixed(20, Duration::from_secs(2)),
            metrics: RetryPolicy::fixed(5000, Duration::from_secs(5)),
        }
    }
}

/// How the containerized service and scanner are driven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSettings {
    /// Program to run (e.g., "docker")
    pub program: String,

    /// Arguments placed before every compose subcommand (e.g., ["compose"])
    pub base_args: Vec<String>,

    /// Compose service running the analysis service
    pub service: String,

    /// Compose service running the scanner
    pub scanner_service: String,

    /// Directory inside the scanner container where sources are mounted
    pub mount_root: String,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            base_args: vec!["compose".to_string()],
            service: "sonarqube".to_string(),
            scanner_service: "sonar-scanner-cli".to_string(),
            mount_root: "/usr/src".to_string(),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Analysis service base URL used by this process
    pub sonar_url: String,

    /// Service URL as seen from inside the scanner container
    pub scanner_host_url: String,

    /// Administrative login
    pub username: String,

    /// Administrative password
    pub password: String,

    /// Directory holding one sub-directory per project to scan
    pub scan_root: PathBuf,

    /// SQLite file receiving the metrics
    pub database_path: PathBuf,

    /// Max pipelines running at once
    pub max_parallel_projects: usize,

    /// Pause before the first readiness probe
    pub startup_grace: Duration,

    /// Source exclusion filter passed to the scanner
    pub scanner_exclusions: String,

    pub retries: RetryBudgets,

    pub compose: ComposeSettings,
}

impl Config {
    /// Creates a new configuration with defaults rooted at `base_dir`
    pub fn new(base_dir: PathBuf) -> Self {
        let sonar_url = "http://172.17.0.1:9000".to_string();
        Self {
            scanner_host_url: sonar_url.clone(),
            sonar_url,
            username: "admin".to_string(),
            password: "admin".to_string(),
            scan_root: base_dir.join("scan_here"),
            database_path: base_dir.join("output").join("main.db"),
            max_parallel_projects: DEFAULT_PARALLEL_PROJECTS,
            startup_grace: Duration::from_secs(10),
            scanner_exclusions: "**/*.java".to_string(),
            retries: RetryBudgets::default(),
            compose: ComposeSettings::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables (all optional):
    /// - SONAR_USERNAME, SONAR_PASSWORD (default: admin / admin)
    /// - SONAR_URL (default: http://172.17.0.1:9000)
    /// - SONAR_SCANNER_HOST_URL (default: SONAR_URL)
    /// - SNQB_SCAN_DIR (default: ./scan_here)
    /// - SNQB_DATABASE (default: ./output/main.db)
    /// - SNQB_MAX_PARALLEL (default: 4)
    /// - SNQB_COMPOSE_PROGRAM (default: docker)
    pub fn from_env() -> anyhow::Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| anyhow::anyhow!("Cannot resolve working directory: {}", e))?;
        let mut config = Self::new(base_dir.clone());

        if let Ok(username) = std::env::var("SONAR_USERNAME") {
            config.username = username;
        }
        if let Ok(password) = std::env::var("SONAR_PASSWORD") {
            config.password = password;
        }
        if let Ok(url) = std::env::var("SONAR_URL") {
            config.scanner_host_url = url.clone();
            config.sonar_url = url;
        }
        if let Ok(url) = std::env::var("SONAR_SCANNER_HOST_URL") {
            config.scanner_host_url = url;
        }
        if let Ok(dir) = std::env::var("SNQB_SCAN_DIR") {
            config.scan_root = resolve(&base_dir, &dir);
        }
        if let Ok(path) = std::env::var("SNQB_DATABASE") {
            config.database_path = resolve(&base_dir, &path);
        }
        if let Some(max) = std::env::var("SNQB_MAX_PARALLEL")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.max_parallel_projects = max;
        }
        if let Ok(program) = std::env::var("SNQB_COMPOSE_PROGRAM") {
            config.compose.program = program;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [
            ("sonar_url", &self.sonar_url),
            ("scanner_host_url", &self.scanner_host_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.username.is_empty() {
            anyhow::bail!("username cannot be empty");
        }

        if self.max_parallel_projects == 0 {
            anyhow::bail!("max_parallel_projects must be greater than 0");
        }

        if self.compose.program.is_empty() {
            anyhow::bail!("compose program cannot be empty");
        }

        Ok(())
    }
}

/// `value` as an absolute path, relative ones taken from `base_dir`
fn resolve(base_dir: &Path, value: &str) -> PathBuf {
    base_dir.join(value)
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

//! In-memory fakes shared by the runner tests

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use snqb_client::MetricsOutcome;
use snqb_core::domain::credential::ServiceCredential;
use snqb_core::domain::project::ProjectTask;
use snqb_core::domain::status::{CreateOutcome, ServiceStatus};
use snqb_core::dto::Measure;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::context::RunContext;
use crate::lifecycle::ServiceLifecycle;
use crate::scanner::{ScanOutput, ScanProcess, ScanRequest};
use crate::service::AnalysisService;

pub fn test_context() -> RunContext {
    RunContext::new(Uuid::nil(), ServiceCredential::new("squ_test_token"))
}

/// Analysis service keeping its projects in memory
#[derive(Default)]
pub struct FakeAnalysisService {
    ready: Mutex<Option<bool>>,
    login_fails: Mutex<bool>,
    token_fails: Mutex<bool>,
    measures: Mutex<Vec<(String, String)>>,
    creation_refusal: Mutex<Option<(u16, String)>>,
    metrics_rejection: Mutex<Option<(u16, String)>>,
    registered: Mutex<HashSet<String>>,
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    calls: Mutex<Vec<&'static str>>,
    tokens_issued: AtomicUsize,
    metric_requests: AtomicUsize,
}

impl FakeAnalysisService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_measures(self, measures: &[(&str, &str)]) -> Self {
        *self.measures.lock().unwrap() = measures
            .iter()
            .map(|(m, v)| (m.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn never_ready(self) -> Self {
        *self.ready.lock().unwrap() = Some(false);
        self
    }

    pub fn failing_login(self) -> Self {
        *self.login_fails.lock().unwrap() = true;
        self
    }

    pub fn failing_token(self) -> Self {
        *self.token_fails.lock().unwrap() = true;
        self
    }

    pub fn refusing_creation(self, status: u16, message: &str) -> Self {
        *self.creation_refusal.lock().unwrap() = Some((status, message.to_string()));
        self
    }

    pub fn rejecting_metrics(self, status: u16, body: &str) -> Self {
        *self.metrics_rejection.lock().unwrap() = Some((status, body.to_string()));
        self
    }

    pub fn register(&self, key: &str) {
        self.registered.lock().unwrap().insert(key.to_string());
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.registered.lock().unwrap().contains(key)
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Bootstrap calls in the order they were made
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tokens_issued(&self) -> usize {
        self.tokens_issued.load(Ordering::SeqCst)
    }

    pub fn metric_requests(&self) -> usize {
        self.metric_requests.load(Ordering::SeqCst)
    }

    fn call(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl AnalysisService for FakeAnalysisService {
    async fn wait_until_ready(&self) -> Result<ServiceStatus> {
        self.call("wait_until_ready");
        match *self.ready.lock().unwrap() {
            Some(false) => Err(anyhow!("analysis service did not become operational in time")),
            _ => Ok(ServiceStatus::Up),
        }
    }

    async fn login(&self) -> Result<()> {
        self.call("login");
        if *self.login_fails.lock().unwrap() {
            return Err(anyhow!("API error (status 401): unauthorized"));
        }
        Ok(())
    }

    async fn issue_token(&self, _name: &str) -> Result<ServiceCredential> {
        self.call("issue_token");
        if *self.token_fails.lock().unwrap() {
            return Err(anyhow!("API error (status 403): forbidden"));
        }
        let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst);
        Ok(ServiceCredential::new(format!("squ_fake_{}", n)))
    }

    async fn create_project(&self, task: &ProjectTask) -> Result<CreateOutcome> {
        if let Some((status, message)) = self.creation_refusal.lock().unwrap().clone() {
            return Ok(CreateOutcome::Failed { status, message });
        }

        self.created.lock().unwrap().push(task.id.clone());
        if self.registered.lock().unwrap().insert(task.id.clone()) {
            Ok(CreateOutcome::Created)
        } else {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    async fn fetch_metrics(&self, task: &ProjectTask, metric_keys: &[&str]) -> Result<MetricsOutcome> {
        self.metric_requests.fetch_add(1, Ordering::SeqCst);
        if let Some((status, body)) = self.metrics_rejection.lock().unwrap().clone() {
            return Ok(MetricsOutcome::Rejected { status, body });
        }
        if !self.is_registered(&task.id) {
            return Err(anyhow!("component {} not found", task.id));
        }

        let measures = self
            .measures
            .lock()
            .unwrap()
            .iter()
            .filter(|(metric, _)| metric_keys.contains(&metric.as_str()))
            .map(|(metric, value)| Measure {
                metric: metric.clone(),
                value: Some(serde_json::Value::String(value.clone())),
                period: None,
            })
            .collect();

        Ok(MetricsOutcome::Measures(measures))
    }

    async fn delete_project(&self, task: &ProjectTask) -> Result<()> {
        if self.registered.lock().unwrap().remove(&task.id) {
            self.deleted.lock().unwrap().push(task.id.clone());
        }
        Ok(())
    }
}

/// Scanner process that records invocations instead of launching anything
pub struct CountingScanProcess {
    failures_before_success: usize,
    failing_projects: HashSet<String>,
    panicking_projects: HashSet<String>,
    delay: Duration,
    invocations: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
    last_request: Mutex<Option<ScanRequest>>,
}

impl CountingScanProcess {
    fn with_failures(failures_before_success: usize) -> Self {
        Self {
            failures_before_success,
            failing_projects: HashSet::new(),
            panicking_projects: HashSet::new(),
            delay: Duration::ZERO,
            invocations: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn succeeding() -> Self {
        Self::with_failures(0)
    }

    pub fn failing_first(failures: usize) -> Self {
        Self::with_failures(failures)
    }

    pub fn always_failing() -> Self {
        Self::with_failures(usize::MAX)
    }

    /// Makes every scan of `project_key` exit non-zero
    pub fn failing_project(mut self, project_key: &str) -> Self {
        self.failing_projects.insert(project_key.to_string());
        self
    }

    /// Makes every scan of `project_key` panic
    pub fn panicking_project(mut self, project_key: &str) -> Self {
        self.panicking_projects.insert(project_key.to_string());
        self
    }

    /// Keeps every invocation busy for `delay`
    pub fn taking(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Highest number of invocations observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ScanRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanProcess for CountingScanProcess {
    async fn invoke(&self, request: &ScanRequest) -> Result<ScanOutput> {
        let previous = self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.panicking_projects.contains(&request.project_key) {
            panic!("scanner crashed for {}", request.project_key);
        }
        *self.last_request.lock().unwrap() = Some(request.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let failed = previous < self.failures_before_success
            || self.failing_projects.contains(&request.project_key);
        let exit_code = if failed { 1 } else { 0 };
        Ok(ScanOutput {
            exit_code: Some(exit_code),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "ERROR: Error during SonarScanner execution".to_string()
            },
        })
    }
}

/// Lifecycle that only counts teardowns
#[derive(Default)]
pub struct RecordingLifecycle {
    teardowns: AtomicUsize,
}

impl RecordingLifecycle {
    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceLifecycle for RecordingLifecycle {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

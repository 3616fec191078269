//! Measures endpoint

use reqwest::StatusCode;
use snqb_core::dto::{ComponentMeasures, Measure};
use snqb_core::{Attempt, RetryPolicy};
use tracing::{debug, info, warn};

use crate::SonarClient;
use crate::error::{ClientError, Result};

/// What the measures endpoint finally answered
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsOutcome {
    /// A non-empty measures list
    Measures(Vec<Measure>),

    /// The service refused the request with a status other than 404/503.
    /// Carries the raw response body; callers treat this as a failed collection.
    Rejected { status: u16, body: String },
}

impl SonarClient {
    /// Poll the computed measures of `key` until they are available
    ///
    /// 404 and 503 mean the analysis is still being processed, as does a
    /// 200 with an empty measures list; all three are retried, as are
    /// transport errors. Any other status ends polling with
    /// [`MetricsOutcome::Rejected`].
    pub async fn fetch_metrics(
        &self,
        key: &str,
        metric_keys: &[&str],
        policy: &RetryPolicy,
    ) -> Result<MetricsOutcome> {
        let joined = metric_keys.join(",");
        let operation = format!("metrics collection for project '{}'", key);

        let outcome = policy
            .run(&operation, |_| self.metrics_attempt(key, &joined))
            .await?;

        if let MetricsOutcome::Measures(ref measures) = outcome {
            info!("Received {} measures for project '{}'", measures.len(), key);
        }
        Ok(outcome)
    }

    async fn metrics_attempt(&self, key: &str, metric_keys: &str) -> Result<Attempt<MetricsOutcome>> {
        let url = self.url("/api/measures/component");
        let response = match self
            .authed(self.client.get(&url))
            .query(&[("component", key), ("metricKeys", metric_keys)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(Attempt::Retry(format!("network error: {}", e))),
        };

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body: ComponentMeasures = response.json().await.map_err(|e| {
                    ClientError::ParseError(format!("Failed to parse measures response: {}", e))
                })?;

                if body.component.measures.is_empty() {
                    debug!("Measures for project '{}' not computed yet", key);
                    Ok(Attempt::Retry("no measures available yet".to_string()))
                } else {
                    Ok(Attempt::Done(MetricsOutcome::Measures(body.component.measures)))
                }
            }
            StatusCode::NOT_FOUND | StatusCode::SERVICE_UNAVAILABLE => Ok(Attempt::Retry(
                format!("service returned {} for project '{}'", status.as_u16(), key),
            )),
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    "Failed to gather metrics for project '{}' (status {})",
                    key, status
                );
                Ok(Attempt::Done(MetricsOutcome::Rejected {
                    status: status.as_u16(),
                    body,
                }))
            }
        }
    }
}

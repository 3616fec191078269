//! Metric domain model

use serde::{Deserialize, Serialize};

use crate::dto::Measure;

/// Quality measures requested for every project
pub const METRIC_KEYS: &[&str] = &[
    "bugs",
    "new_bugs",
    "vulnerabilities",
    "new_vulnerabilities",
    "code_smells",
    "new_code_smells",
    "high_impact_accepted_issues",
    "new_blocker_violations",
    "new_critical_violations",
    "new_major_violations",
    "new_minor_violations",
    "new_info_violations",
    "blocker_violations",
    "critical_violations",
    "major_violations",
    "minor_violations",
    "info_violations",
    "security_hotspots",
    "complexity",
    "cognitive_complexity",
    "coverage",
    "line_coverage",
    "branch_coverage",
    "ncloc",
    "lines",
    "files",
    "functions",
    "statements",
    "comment_lines",
    "comment_lines_density",
    "software_quality_blocker_issues",
    "software_quality_high_issues",
    "software_quality_info_issues",
    "software_quality_medium_issues",
    "software_quality_low_issues",
    "software_quality_maintainability_issues",
    "software_quality_reliability_issues",
    "software_quality_security_issues",
    "new_software_quality_blocker_issues",
    "new_software_quality_high_issues",
    "new_software_quality_info_issues",
    "new_software_quality_medium_issues",
    "new_software_quality_low_issues",
    "new_software_quality_maintainability_issues",
    "new_software_quality_reliability_issues",
    "new_software_quality_security_issues",
];

/// One persisted measure of one project
///
/// `(project_id, metric_name)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub project_id: String,
    pub metric_name: String,
    pub value: String,
}

impl MetricRecord {
    pub fn new(
        project_id: impl Into<String>,
        metric_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            metric_name: metric_name.into(),
            value: value.into(),
        }
    }

    /// Turns a measures list into records keyed by `project_id`
    ///
    /// New-code metrics only carry a period value; measures with no value at
    /// all are dropped.
    pub fn from_measures(project_id: &str, measures: &[Measure]) -> Vec<MetricRecord> {
        measures
            .iter()
            .filter_map(|measure| {
                measure
                    .effective_value()
                    .map(|value| MetricRecord::new(project_id, &measure.metric, value))
            })
            .collect()
    }
}

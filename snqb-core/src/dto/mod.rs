//! Analysis service DTOs
//!
//! Response bodies of the analysis service API, reduced to the fields the
//! pipeline reads.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body of `GET /api/system/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
}

/// Body of `POST /api/user_tokens/generate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedToken {
    pub token: String,
}

/// Body of `GET /api/projects/search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSearch {
    #[serde(default)]
    pub components: Vec<ProjectComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectComponent {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `GET /api/measures/component`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentMeasures {
    #[serde(default)]
    pub component: MeasuredComponent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasuredComponent {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// One computed measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub metric: String,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub period: Option<PeriodValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodValue {
    #[serde(default)]
    pub value: Option<JsonValue>,
}

impl Measure {
    /// The measure value as text, falling back to the new-code period value
    pub fn effective_value(&self) -> Option<String> {
        self.value
            .as_ref()
            .or_else(|| self.period.as_ref().and_then(|p| p.value.as_ref()))
            .and_then(value_to_string)
    }
}

fn value_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

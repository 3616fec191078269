//! Project task domain model
//!
//! A project task is one source tree to analyze. It is built once before any
//! pipeline starts and is never persisted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Separator between the project name and its ordinal in a service-side id
pub const ID_SEPARATOR: &str = "_-_";

/// One project to carry through a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectTask {
    /// Directory name of the project under the scan root
    pub name: String,

    /// Ordinal of the project within the run
    pub key: usize,

    /// Identifier used with the analysis service (`<name>_-_<key>`)
    pub id: String,
}

/// Two tasks of the same run ended up with the same service-side id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate project id '{0}' in run")]
pub struct DuplicateProjectId(pub String);

impl ProjectTask {
    /// Creates a task, deriving its id from `name` and `key`
    pub fn new(name: impl Into<String>, key: usize) -> Self {
        let name = name.into();
        let id = format!("{}{}{}", name, ID_SEPARATOR, key);
        Self { name, key, id }
    }

    /// Builds the task set of a run, using each project's position as its key
    ///
    /// Fails if two tasks would share an id.
    pub fn batch<I, S>(names: I) -> Result<Vec<ProjectTask>, DuplicateProjectId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tasks: Vec<ProjectTask> = names
            .into_iter()
            .enumerate()
            .map(|(key, name)| ProjectTask::new(name, key))
            .collect();

        let mut seen = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(DuplicateProjectId(task.id.clone()));
            }
        }

        Ok(tasks)
    }
}

impl std::fmt::Display for ProjectTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

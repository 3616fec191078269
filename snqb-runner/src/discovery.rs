//! Project discovery
//!
//! Every immediate sub-directory of the scan root is one project.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Names of the project directories under `scan_root`, sorted
///
/// Creates `scan_root` when it does not exist yet.
pub fn discover_projects(scan_root: &Path) -> Result<Vec<String>> {
    if !scan_root.exists() {
        std::fs::create_dir_all(scan_root)
            .with_context(|| format!("Failed to create scan root {}", scan_root.display()))?;
        info!("Created empty scan root {}", scan_root.display());
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(scan_root)
        .with_context(|| format!("Failed to read scan root {}", scan_root.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read scan root entry")?;
        // Follows symlinks, so linked project trees count too
        if !entry.path().is_dir() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!("Skipping project directory with non UTF-8 name {:?}", raw),
        }
    }

    names.sort();
    Ok(names)
}

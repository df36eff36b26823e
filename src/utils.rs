//! Small shared helpers.

use anyhow::{Context, Result};
use std::path::Path;

/// Create a directory (and parents) if it doesn't exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Current UTC time in the storage format used across the database.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current UTC calendar date in the storage format (`YYYY-MM-DD`).
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

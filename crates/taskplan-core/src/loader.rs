//! Plan loading and validation.
//!
//! Plans come from JSON files (`.json` / `.js`) or are built in code and
//! passed through [`plan_from_value`]. Every entry point runs full
//! cross-reference validation before returning, so a job referencing an
//! undefined env or note is a load-time `ConfigError`, not a runtime
//! surprise.

use std::path::Path;

use crate::domain::{ConfigError, TaskPlan};
use crate::noters::NoterRegistry;

/// Load and validate a plan from a file path, dispatching on extension.
pub async fn load_plan(path: &Path, registry: &NoterRegistry) -> Result<TaskPlan, ConfigError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") | Some("js") => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            plan_from_json(&text, registry)
        }
        _ => Err(ConfigError::UnsupportedFile(path.to_path_buf())),
    }
}

/// Parse and validate a plan from JSON text.
pub fn plan_from_json(text: &str, registry: &NoterRegistry) -> Result<TaskPlan, ConfigError> {
    let plan: TaskPlan = serde_json::from_str(text)?;
    plan.validate(registry)?;
    Ok(plan)
}

/// Validate a plan built in code (the "code-defined module" flavor).
pub fn plan_from_value(
    value: serde_json::Value,
    registry: &NoterRegistry,
) -> Result<TaskPlan, ConfigError> {
    let plan: TaskPlan = serde_json::from_value(value)?;
    plan.validate(registry)?;
    Ok(plan)
}

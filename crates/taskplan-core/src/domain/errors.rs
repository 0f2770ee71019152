//! Error types.
//!
//! Three kinds cover the failure surface: `ConfigError` (malformed or
//! inconsistent plan), `ProvisioningError` (environment setup failure), and
//! `JobExecutionError` (command failed). All of them propagate to the run
//! invocation and are additionally surfaced through the configured noter.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed or inconsistent task plan.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported plan file type: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("failed to read plan file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plan JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("job '{job}' references unknown env '{env}'")]
    UnknownEnv { job: String, env: String },

    #[error("job '{job}' references unknown note '{note}'")]
    UnknownNote { job: String, note: String },

    #[error("no job named '{0}' in plan")]
    UnknownJob(String),

    #[error("note '{note}' selects unknown noter class '{class_name}'")]
    UnknownNoterClass { note: String, class_name: String },

    #[error("noter class '{0}' is already registered")]
    DuplicateNoterClass(String),

    #[error("invalid options for noter class '{class_name}': {reason}")]
    BadNoteOptions { class_name: String, reason: String },

    #[error("job '{job}' has an invalid command: {reason}")]
    BadCommand { job: String, reason: String },

    #[error("job '{job}' has an invalid timeout: {timeout}")]
    BadTimeout { job: String, timeout: f64 },
}

/// Environment setup failure (job dir, virtualenv, requirements, env vars).
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("failed to create job directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// A job's command failed: non-zero exit, timeout, or spawn error.
#[derive(Debug, Error)]
pub enum JobExecutionError {
    #[error("job '{job}' exited with code {code}")]
    NonZeroExit { job: String, code: i32 },

    #[error("job '{job}' timed out")]
    Timeout { job: String },

    #[error("job '{job}' failed: {reason}")]
    Failed { job: String, reason: String },
}

/// Umbrella error so the three kinds compose with `?` across layers.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    JobExecution(#[from] JobExecutionError),
}

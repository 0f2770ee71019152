//! Input model for task plans (TaskPlan / TaskEnv / TaskNote / TaskJob).
//!
//! A plan is loaded once per run and is immutable afterwards. All maps use
//! `IndexMap` so that job execution order and summaries follow the order of
//! the source file.

use indexmap::IndexMap;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use crate::noters::NoterRegistry;

/// Default job timeout in seconds.
fn default_timeout() -> f64 {
    300.0
}

/// Execution context for a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEnv {
    /// Runtime used to provision a virtualenv (e.g. `python3.11`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Dependency specifiers installed into the virtualenv, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,

    /// Working directory relative to the per-job directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Environment variables exported for the job's duration.
    ///
    /// Values wrapped in backticks are replaced by the trimmed stdout of the
    /// quoted shell command; `$NAME` references are substituted from the
    /// variables resolved so far (declaration order matters).
    #[serde(default)]
    pub vars: IndexMap<String, String>,
}

impl TaskEnv {
    /// Does this env ask for a provisioned virtualenv?
    pub fn wants_venv(&self) -> bool {
        self.runtime.is_some() || self.requirements.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// How to record job results and possibly notify someone.
///
/// `class_name` selects a notifier from the registry; every other key is an
/// option forwarded to that notifier's constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNote {
    pub class_name: String,

    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Command of a job: a single shell-style string or an explicit argv.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Resolve to an argv ready for spawning.
    ///
    /// Without `shell`, string commands are tokenized with shell-style
    /// quoting rules. With `shell`, the whole command runs through `sh -c`.
    pub fn to_argv(&self, shell: bool, job: &str) -> Result<Vec<String>, ConfigError> {
        if shell {
            let line = match self {
                CommandSpec::Line(line) => line.clone(),
                CommandSpec::Argv(argv) => shell_words::join(argv),
            };
            return Ok(vec!["sh".to_string(), "-c".to_string(), line]);
        }
        match self {
            CommandSpec::Line(line) => {
                shell_words::split(line).map_err(|e| ConfigError::BadCommand {
                    job: job.to_string(),
                    reason: e.to_string(),
                })
            }
            CommandSpec::Argv(argv) => Ok(argv.clone()),
        }
    }
}

/// How to run the job for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskJob {
    /// Name of the TaskEnv to run in.
    pub env: String,

    /// Name of the TaskNote used to report the result. When absent the
    /// runner falls back to the builtin echo notifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    pub command: CommandSpec,

    /// Timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Run the command through `sh -c` instead of spawning it directly.
    #[serde(default)]
    pub shell: bool,

    /// Optional free-form description lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub description: Vec<String>,
}

impl TaskJob {
    /// The note name, treating an empty string like "no note configured".
    pub fn note_name(&self) -> Option<&str> {
        self.note.as_deref().filter(|n| !n.is_empty())
    }
}

/// Root model: dictionaries of envs, notes, and jobs, keyed by name.
///
/// All three top-level keys are required and nothing else is accepted, so a
/// malformed plan fails at load time rather than at run time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskPlan {
    pub envs: IndexMap<String, TaskEnv>,
    pub notes: IndexMap<String, TaskNote>,
    pub jobs: IndexMap<String, TaskJob>,
}

impl TaskPlan {
    /// Check cross-references and per-job settings against the registry.
    ///
    /// Every env/note name referenced by a job must exist, every note class
    /// must be known, string commands must tokenize, and timeouts must be
    /// finite and positive.
    pub fn validate(&self, registry: &NoterRegistry) -> Result<(), ConfigError> {
        for (note_name, note) in &self.notes {
            if !registry.contains(&note.class_name) {
                return Err(ConfigError::UnknownNoterClass {
                    note: note_name.clone(),
                    class_name: note.class_name.clone(),
                });
            }
        }
        for (job_name, job) in &self.jobs {
            if !self.envs.contains_key(&job.env) {
                return Err(ConfigError::UnknownEnv {
                    job: job_name.clone(),
                    env: job.env.clone(),
                });
            }
            if let Some(note) = job.note_name()
                && !self.notes.contains_key(note)
            {
                return Err(ConfigError::UnknownNote {
                    job: job_name.clone(),
                    note: note.to_string(),
                });
            }
            if !(job.timeout.is_finite() && job.timeout > 0.0) {
                return Err(ConfigError::BadTimeout {
                    job: job_name.clone(),
                    timeout: job.timeout,
                });
            }
            job.command.to_argv(job.shell, job_name)?;
        }
        Ok(())
    }
}

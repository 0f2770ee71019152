//! taskplan-core
//!
//! Core building blocks for the taskplan runner.
//!
//! A task plan is a declarative description of automated work: named
//! environments (`TaskEnv`), named result-reporting strategies (`TaskNote`),
//! and named jobs (`TaskJob`) binding a command to one env and one note.
//!
//! - **domain**: plan and outcome models, error types
//! - **loader**: plan loading from JSON files / values, cross-reference validation
//! - **resolver**: TaskEnv -> concrete execution context (dirs, venv, env vars)
//! - **noters**: `Noter` trait, class-name registry, builtin notifiers
//! - **runner**: sequential job execution and note dispatch

pub mod domain;
pub mod loader;
pub mod noters;
pub mod resolver;
pub mod runner;

pub use domain::{
    CommandSpec, ConfigError, JobExecutionError, JobOutcome, JobStatus, ProvisioningError,
    RunSummary, TaskEnv, TaskError, TaskJob, TaskNote, TaskPlan,
};
pub use loader::{load_plan, plan_from_json, plan_from_value};
pub use noters::{NoteError, Noter, NoterRegistry};
pub use resolver::{EnvResolver, ResolvedEnv};
pub use runner::{JobRunner, RunReport};

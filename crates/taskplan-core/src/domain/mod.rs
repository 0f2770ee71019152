//! Domain model (plan, outcomes, errors).

pub mod errors;
pub mod outcome;
pub mod plan;

pub use errors::{ConfigError, JobExecutionError, ProvisioningError, TaskError};
pub use outcome::{JobOutcome, JobStatus, RunSummary};
pub use plan::{CommandSpec, TaskEnv, TaskJob, TaskNote, TaskPlan};

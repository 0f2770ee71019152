//! Job execution: resolve env, run command, report through the noter.
//!
//! Jobs run sequentially in plan order. Execution failures are captured into
//! the outcome and always handed to the configured noter before the runner
//! reports anything to its caller; a failing noter never fails the job.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use tokio::process::Command;

use crate::domain::{ConfigError, JobOutcome, RunSummary, TaskError, TaskJob, TaskPlan};
use crate::noters::{EchoNotifier, Noter, NoterRegistry};
use crate::resolver::{EnvResolver, ResolvedEnv, substitute};

pub struct JobRunner {
    plan: TaskPlan,
    registry: NoterRegistry,
    resolver: EnvResolver,
}

/// Outcomes of a whole run, in plan order.
#[derive(Debug)]
pub struct RunReport {
    pub outcomes: IndexMap<String, JobOutcome>,
    pub summary: RunSummary,
}

impl JobRunner {
    pub fn new(plan: TaskPlan, registry: NoterRegistry, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            plan,
            registry,
            resolver: EnvResolver::new(working_dir),
        }
    }

    pub fn plan(&self) -> &TaskPlan {
        &self.plan
    }

    /// Run a single job and report its result through the configured noter.
    ///
    /// Returns `Err` only for plan-level problems (unknown job name); command
    /// failures are captured in the outcome. Use
    /// [`JobOutcome::execution_error`] to escalate a failed outcome.
    pub async fn run_job(&self, job_name: &str) -> Result<JobOutcome, TaskError> {
        let job = self
            .plan
            .jobs
            .get(job_name)
            .ok_or_else(|| ConfigError::UnknownJob(job_name.to_string()))?;
        let env = self
            .plan
            .envs
            .get(&job.env)
            .ok_or_else(|| ConfigError::UnknownEnv {
                job: job_name.to_string(),
                env: job.env.clone(),
            })?;

        let started_at = Utc::now();
        let (mut outcome, vars) = match self.resolver.resolve(job_name, env).await {
            Ok(resolved) => {
                let vars = resolved.vars.clone();
                (self.execute(job_name, job, &resolved).await, vars)
            }
            Err(e) => {
                tracing::warn!(job = job_name, error = %e, "environment resolution failed");
                (
                    JobOutcome::run_error(job_name, Vec::new(), PathBuf::new(), e.to_string(), started_at),
                    IndexMap::new(),
                )
            }
        };

        self.notify(job, &mut outcome, &vars).await;

        if let Some(err) = outcome.execution_error() {
            tracing::warn!(
                job = job_name,
                exit_code = ?outcome.exit_code,
                error = %err,
                "job failed"
            );
        }
        Ok(outcome)
    }

    /// Run every job in plan order.
    ///
    /// With `strict`, the first failed job aborts the run with its
    /// `JobExecutionError`; otherwise all jobs run and the report carries the
    /// per-job outcomes.
    pub async fn run_all(&self, strict: bool) -> Result<RunReport, TaskError> {
        let mut outcomes = IndexMap::new();
        let mut summary = RunSummary::default();
        let names: Vec<String> = self.plan.jobs.keys().cloned().collect();

        for name in names {
            let outcome = self.run_job(&name).await?;
            summary.record(&outcome);
            let execution_error = outcome.execution_error();
            outcomes.insert(name, outcome);
            if strict && let Some(err) = execution_error {
                return Err(err.into());
            }
        }
        Ok(RunReport { outcomes, summary })
    }

    /// Spawn the job's command in its resolved context and capture the result.
    async fn execute(&self, job_name: &str, job: &TaskJob, resolved: &ResolvedEnv) -> JobOutcome {
        let started_at = Utc::now();
        let argv = match job.command.to_argv(job.shell, job_name) {
            Ok(argv) => argv,
            Err(e) => {
                return JobOutcome::run_error(
                    job_name,
                    Vec::new(),
                    resolved.cwd.clone(),
                    e.to_string(),
                    started_at,
                );
            }
        };
        let argv: Vec<String> = argv
            .iter()
            .map(|arg| substitute(arg, &resolved.vars))
            .collect();
        let Some((program, args)) = argv.split_first() else {
            return JobOutcome::run_error(
                job_name,
                argv.clone(),
                resolved.cwd.clone(),
                "empty command",
                started_at,
            );
        };

        tracing::info!(job = job_name, command = %shell_words::join(&argv), "running job");

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&resolved.cwd)
            .env_clear()
            .envs(&resolved.vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = match std::time::Duration::try_from_secs_f64(job.timeout) {
            Ok(timeout) => timeout,
            Err(_) => {
                return JobOutcome::run_error(
                    job_name,
                    argv,
                    resolved.cwd.clone(),
                    format!("invalid timeout: {}", job.timeout),
                    started_at,
                );
            }
        };
        match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => {
                JobOutcome::completed(job_name, argv, resolved.cwd.clone(), &output, started_at)
            }
            Ok(Err(e)) => JobOutcome::run_error(
                job_name,
                argv,
                resolved.cwd.clone(),
                format!("failed to spawn command: {e}"),
                started_at,
            ),
            Err(_) => JobOutcome::timed_out(
                job_name,
                argv,
                resolved.cwd.clone(),
                job.timeout,
                started_at,
            ),
        }
    }

    /// Hand the outcome to the job's noter. Notification failures are logged
    /// and recorded on the outcome, never propagated.
    async fn notify(&self, job: &TaskJob, outcome: &mut JobOutcome, vars: &IndexMap<String, String>) {
        let noter: Result<Arc<dyn Noter>, ConfigError> = match job.note_name() {
            Some(name) => match self.plan.notes.get(name) {
                Some(note) => self.registry.build(name, note, vars),
                None => Err(ConfigError::UnknownNote {
                    job: outcome.job.clone(),
                    note: name.to_string(),
                }),
            },
            None => {
                tracing::warn!(job = %outcome.job, "no note configured; using EchoNotifier");
                Ok(Arc::new(EchoNotifier::new()))
            }
        };

        match noter {
            Ok(noter) => {
                if let Err(e) = noter.notify_result(outcome).await {
                    tracing::warn!(job = %outcome.job, error = %e, "noter failed");
                    outcome.notify_error = Some(e.to_string());
                }
            }
            Err(e) => {
                tracing::warn!(job = %outcome.job, error = %e, "could not build noter");
                outcome.notify_error = Some(e.to_string());
            }
        }
    }
}

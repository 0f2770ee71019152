//! Outcome model: common result format for job executions.
//!
//! This module only defines the "shape" of results that the runner captures
//! and noters record; it does not assume anything about how jobs are spawned.

use std::fmt;
use std::path::PathBuf;
use std::process::Output;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::JobExecutionError;

/// Classification of a job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Command ran and exited zero.
    Success,

    /// Command ran and exited non-zero.
    Failed,

    /// Command did not finish within the job's timeout.
    Timeout,

    /// Command could not be run at all (spawn or provisioning failure).
    Error,
}

impl JobStatus {
    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Success)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Captured result of one job execution, handed to the configured noter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job: String,
    pub status: JobStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Captured stdout.
    #[serde(default)]
    pub output: String,

    /// Captured stderr.
    #[serde(default)]
    pub stderr: String,

    /// Failure detail; never set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The argv that was (or would have been) spawned.
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub cwd: PathBuf,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Set when the noter itself failed; a notification failure never fails
    /// the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_error: Option<String>,
}

impl JobOutcome {
    /// Outcome for a command that ran to completion.
    pub fn completed(
        job: impl Into<String>,
        command: Vec<String>,
        cwd: PathBuf,
        output: &Output,
        started_at: DateTime<Utc>,
    ) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        let success = output.status.success();
        let error = if success {
            None
        } else if stderr.is_empty() {
            Some("unknown".to_string())
        } else {
            Some(stderr.clone())
        };
        Self {
            job: job.into(),
            status: if success {
                JobStatus::Success
            } else {
                JobStatus::Failed
            },
            exit_code,
            output: stdout,
            stderr,
            error,
            command,
            cwd,
            started_at,
            finished_at: Utc::now(),
            notify_error: None,
        }
    }

    /// Outcome for a command that exceeded the job's timeout.
    pub fn timed_out(
        job: impl Into<String>,
        command: Vec<String>,
        cwd: PathBuf,
        timeout: f64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job: job.into(),
            status: JobStatus::Timeout,
            exit_code: Some(-1),
            output: String::new(),
            stderr: String::new(),
            error: Some(format!("command timed out after {timeout}s")),
            command,
            cwd,
            started_at,
            finished_at: Utc::now(),
            notify_error: None,
        }
    }

    /// Outcome for a job that could not be run (spawn or provisioning failure).
    pub fn run_error(
        job: impl Into<String>,
        command: Vec<String>,
        cwd: PathBuf,
        reason: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job: job.into(),
            status: JobStatus::Error,
            exit_code: Some(-1),
            output: String::new(),
            stderr: String::new(),
            error: Some(reason.into()),
            command,
            cwd,
            started_at,
            finished_at: Utc::now(),
            notify_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `JobExecutionError` this outcome amounts to, if any.
    pub fn execution_error(&self) -> Option<JobExecutionError> {
        match self.status {
            JobStatus::Success => None,
            JobStatus::Failed => Some(JobExecutionError::NonZeroExit {
                job: self.job.clone(),
                code: self.exit_code.unwrap_or(-1),
            }),
            JobStatus::Timeout => Some(JobExecutionError::Timeout {
                job: self.job.clone(),
            }),
            JobStatus::Error => Some(JobExecutionError::Failed {
                job: self.job.clone(),
                reason: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "job '{}': {}", self.job, self.status)?;
        writeln!(f, "command: {}", shell_words::join(&self.command))?;
        if let Some(code) = self.exit_code {
            writeln!(f, "exit code: {code}")?;
        }
        if !self.output.is_empty() {
            writeln!(f, "output:\n{}", self.output)?;
        }
        if !self.stderr.is_empty() {
            writeln!(f, "stderr:\n{}", self.stderr)?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "error: {error}")?;
        }
        Ok(())
    }
}

/// Success/failure counts over a whole run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &JobOutcome) {
        self.total += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Completed: {}/{} jobs successful", self.succeeded, self.total)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn fake_output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[rstest]
    #[case::success(JobStatus::Success, "success")]
    #[case::failed(JobStatus::Failed, "failed")]
    #[case::timeout(JobStatus::Timeout, "timeout")]
    #[case::error(JobStatus::Error, "error")]
    fn status_display_matches_serde_name(#[case] status: JobStatus, #[case] expected: &str) {
        assert_eq!(status.to_string(), expected);
        let s = serde_json::to_string(&status).unwrap();
        assert_eq!(s, format!("\"{expected}\""));
    }

    #[test]
    fn zero_exit_is_success_without_error() {
        let out = fake_output(0, "hi\n", "");
        let outcome = JobOutcome::completed(
            "greet",
            vec!["echo".into(), "hi".into()],
            PathBuf::from("/tmp"),
            &out,
            Utc::now(),
        );
        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.output, "hi\n");
        assert!(outcome.error.is_none());
        assert!(outcome.execution_error().is_none());
    }

    #[test]
    fn non_zero_exit_records_stderr_as_error() {
        let out = fake_output(2, "", "boom\n");
        let outcome = JobOutcome::completed(
            "greet",
            vec!["false".into()],
            PathBuf::from("/tmp"),
            &out,
            Utc::now(),
        );
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.exit_code, Some(2));
        assert_eq!(outcome.error.as_deref(), Some("boom\n"));

        let err = outcome.execution_error().expect("execution error");
        assert!(matches!(
            err,
            JobExecutionError::NonZeroExit { code: 2, .. }
        ));
    }

    #[test]
    fn timeout_outcome_maps_to_timeout_error() {
        let outcome = JobOutcome::timed_out(
            "slow",
            vec!["sleep".into(), "60".into()],
            PathBuf::from("/tmp"),
            1.5,
            Utc::now(),
        );
        assert_eq!(outcome.status, JobStatus::Timeout);
        assert!(outcome.error.as_deref().unwrap().contains("timed out"));
        assert!(matches!(
            outcome.execution_error(),
            Some(JobExecutionError::Timeout { .. })
        ));
    }

    #[test]
    fn summary_counts_and_renders() {
        let ok = fake_output(0, "", "");
        let bad = fake_output(1, "", "err");
        let mut summary = RunSummary::default();
        summary.record(&JobOutcome::completed(
            "a",
            vec![],
            PathBuf::new(),
            &ok,
            Utc::now(),
        ));
        summary.record(&JobOutcome::completed(
            "b",
            vec![],
            PathBuf::new(),
            &bad,
            Utc::now(),
        ));

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
        assert_eq!(summary.to_string(), "Completed: 1/2 jobs successful");
    }
}

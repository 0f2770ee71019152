//! Environment resolution: TaskEnv -> concrete execution context.
//!
//! Resolution creates the per-job directory, provisions a virtualenv when the
//! env declares a runtime or requirements, and prepares the variable map the
//! job runs with. Resolved variables are handed to the spawned child only;
//! the runner process environment is never mutated, so they cannot leak to
//! sibling jobs.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use indexmap::IndexMap;
use tokio::process::Command;

use crate::domain::{ProvisioningError, TaskEnv, TaskError};

/// Name of the variable carrying the job name into the child environment.
pub const JOB_NAME_VAR: &str = "TASKPLAN_JOB_NAME";

/// Concrete execution context for one job.
#[derive(Debug, Clone)]
pub struct ResolvedEnv {
    /// The complete child environment (parent snapshot + declared vars).
    pub vars: IndexMap<String, String>,

    /// Working directory for the command.
    pub cwd: PathBuf,

    /// Per-job directory under the runner's working dir.
    pub job_dir: PathBuf,
}

/// Resolves TaskEnvs relative to a working directory.
#[derive(Debug, Clone)]
pub struct EnvResolver {
    working_dir: PathBuf,
}

impl EnvResolver {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolve `env` for the named job.
    pub async fn resolve(&self, job_name: &str, env: &TaskEnv) -> Result<ResolvedEnv, TaskError> {
        let job_dir = self.working_dir.join(job_name);
        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(|source| ProvisioningError::CreateDir {
                path: job_dir.clone(),
                source,
            })?;

        let venv_bin = if env.wants_venv() {
            Some(provision_venv(&job_dir, env).await?)
        } else {
            None
        };

        let mut vars = prepare_vars(job_name, env).await?;
        if let Some(bin) = venv_bin {
            let path_sep = if cfg!(windows) { ';' } else { ':' };
            let tail = vars.get("PATH").cloned().unwrap_or_default();
            vars.insert(
                "PATH".to_string(),
                format!("{}{}{}", bin.display(), path_sep, tail),
            );
        }

        let cwd = match &env.path {
            Some(path) => job_dir.join(path),
            None => job_dir.clone(),
        };

        Ok(ResolvedEnv {
            vars,
            cwd,
            job_dir,
        })
    }
}

/// Substitute `$NAME` / `${NAME}` references from `vars`, leaving unknown
/// names intact.
pub(crate) fn substitute(value: &str, vars: &IndexMap<String, String>) -> String {
    shellexpand::env_with_context_no_errors(value, |name| vars.get(name).cloned()).into_owned()
}

/// Build the child environment: parent snapshot, the job-name marker, then
/// the declared vars in declaration order. A value wrapped in backticks is
/// replaced by the trimmed stdout of the quoted shell command; other values
/// get `$NAME` substitution against the map built so far.
async fn prepare_vars(
    job_name: &str,
    env: &TaskEnv,
) -> Result<IndexMap<String, String>, ProvisioningError> {
    let mut vars: IndexMap<String, String> = std::env::vars().collect();
    vars.insert(JOB_NAME_VAR.to_string(), job_name.to_string());

    for (name, value) in &env.vars {
        let resolved = if value.len() >= 2 && value.starts_with('`') && value.ends_with('`') {
            run_shell_command(&value[1..value.len() - 1], &vars).await?
        } else {
            substitute(value, &vars)
        };
        vars.insert(name.clone(), resolved);
    }

    Ok(vars)
}

/// Run a shell command and return its trimmed stdout.
async fn run_shell_command(
    command: &str,
    vars: &IndexMap<String, String>,
) -> Result<String, ProvisioningError> {
    let output = Command::new("sh")
        .args(["-c", command])
        .env_clear()
        .envs(vars)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| ProvisioningError::Launch {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProvisioningError::CommandFailed {
            command: command.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Create `<job_dir>/venv` with the declared runtime and install the declared
/// requirements, in order. Returns the venv's bin directory. Provisioning is
/// skipped when the venv already exists.
async fn provision_venv(job_dir: &Path, env: &TaskEnv) -> Result<PathBuf, ProvisioningError> {
    let venv = job_dir.join("venv");
    let bin = if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    };
    if venv.exists() {
        tracing::debug!(venv = %venv.display(), "virtualenv already provisioned");
        return Ok(bin);
    }

    let runtime = env.runtime.as_deref().unwrap_or("python3");
    tracing::info!(runtime, venv = %venv.display(), "creating virtualenv");
    run_provisioning_step(Command::new(runtime).args(["-m", "venv", "venv"]), job_dir).await?;

    let pip = bin.join("pip");
    for requirement in env.requirements.iter().flatten() {
        tracing::info!(requirement, "installing requirement");
        run_provisioning_step(
            Command::new(&pip).args(["install", requirement.as_str()]),
            job_dir,
        )
        .await?;
    }
    Ok(bin)
}

async fn run_provisioning_step(
    command: &mut Command,
    cwd: &Path,
) -> Result<(), ProvisioningError> {
    let rendered = format!("{:?}", command.as_std());
    let output = command
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| ProvisioningError::Launch {
            command: rendered.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProvisioningError::CommandFailed {
            command: rendered,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskEnv;

    fn env_with_vars(pairs: &[(&str, &str)]) -> TaskEnv {
        TaskEnv {
            vars: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..TaskEnv::default()
        }
    }

    #[tokio::test]
    async fn declared_vars_and_job_name_are_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(dir.path());
        let env = env_with_vars(&[("FOO", "bar")]);

        let resolved = resolver.resolve("myjob", &env).await.unwrap();
        assert_eq!(resolved.vars.get("FOO").map(String::as_str), Some("bar"));
        assert_eq!(
            resolved.vars.get(JOB_NAME_VAR).map(String::as_str),
            Some("myjob")
        );

        // The runner process environment is left untouched.
        assert!(std::env::var("FOO").is_err());
        assert!(std::env::var(JOB_NAME_VAR).is_err());
    }

    #[tokio::test]
    async fn vars_chain_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(dir.path());
        let env = env_with_vars(&[("BASE", "x"), ("DERIVED", "$BASE-y"), ("MISSING", "$NOPE")]);

        let resolved = resolver.resolve("chain", &env).await.unwrap();
        assert_eq!(
            resolved.vars.get("DERIVED").map(String::as_str),
            Some("x-y")
        );
        // Unknown references are left intact, mirroring safe substitution.
        assert_eq!(
            resolved.vars.get("MISSING").map(String::as_str),
            Some("$NOPE")
        );
    }

    #[tokio::test]
    async fn backtick_values_capture_shell_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(dir.path());
        let env = env_with_vars(&[("WHO", "`echo someone`")]);

        let resolved = resolver.resolve("shellout", &env).await.unwrap();
        assert_eq!(
            resolved.vars.get("WHO").map(String::as_str),
            Some("someone")
        );
    }

    #[tokio::test]
    async fn failing_backtick_command_is_a_provisioning_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(dir.path());
        let env = env_with_vars(&[("BAD", "`exit 7`")]);

        let err = resolver.resolve("shellout", &env).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::Provisioning(ProvisioningError::CommandFailed { code: Some(7), .. })
        ));
    }

    #[tokio::test]
    async fn env_path_selects_cwd_under_job_dir() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(dir.path());
        let env = TaskEnv {
            path: Some("sub/dir".to_string()),
            ..TaskEnv::default()
        };

        let resolved = resolver.resolve("pathy", &env).await.unwrap();
        assert_eq!(resolved.job_dir, dir.path().join("pathy"));
        assert_eq!(resolved.cwd, dir.path().join("pathy").join("sub/dir"));
        assert!(resolved.job_dir.is_dir());
    }

    #[tokio::test]
    async fn no_venv_without_runtime_or_requirements() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(dir.path());

        let resolved = resolver.resolve("plain", &TaskEnv::default()).await.unwrap();
        assert!(!resolved.job_dir.join("venv").exists());
        // PATH comes straight from the parent snapshot.
        assert_eq!(
            resolved.vars.get("PATH").cloned(),
            std::env::var("PATH").ok()
        );
    }

    #[tokio::test]
    async fn missing_runtime_is_a_provisioning_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(dir.path());
        let env = TaskEnv {
            runtime: Some("definitely-not-a-real-runtime".to_string()),
            ..TaskEnv::default()
        };

        let err = resolver.resolve("venvjob", &env).await.unwrap_err();
        assert!(matches!(err, TaskError::Provisioning(_)));
    }
}

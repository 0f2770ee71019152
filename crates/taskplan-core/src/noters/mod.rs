//! Noters: polymorphic result reporting.
//!
//! A `TaskNote` selects a noter by class name; the registry maps class names
//! to constructors at plan-load time (no dynamic symbol resolution). Builtin
//! classes: `EchoNotifier`, `FileNotifier`, `TelegramNotifier`.

mod echo;
mod file;
mod registry;
mod telegram;

pub use echo::EchoNotifier;
pub use file::FileNotifier;
pub use registry::{NoterCtor, NoterRegistry};
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::JobOutcome;

/// Failure while recording or delivering a job result.
#[derive(Debug, Error)]
pub enum NoteError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// A result-reporting strategy. Implementations must be cheap to construct:
/// one instance is built per job run, with that job's templated options.
#[async_trait]
pub trait Noter: std::fmt::Debug + Send + Sync {
    async fn notify_result(&self, outcome: &JobOutcome) -> Result<(), NoteError>;
}

/// Conditions that can suppress a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyCondition {
    /// Only notify when the job produced stdout.
    OnlyIfOutputNonEmpty,
}

impl NotifyCondition {
    pub fn allows(self, outcome: &JobOutcome) -> bool {
        match self {
            NotifyCondition::OnlyIfOutputNonEmpty => !outcome.output.is_empty(),
        }
    }
}

/// Check every condition; log which one suppressed the notification.
pub(crate) fn conditions_allow(conditions: &[NotifyCondition], outcome: &JobOutcome) -> bool {
    for condition in conditions {
        if !condition.allows(outcome) {
            tracing::info!(?condition, job = %outcome.job, "condition suppressed notification");
            return false;
        }
    }
    true
}

/// Warn about option keys a noter does not understand (they are ignored, not
/// fatal). `description` is always allowed on a note.
pub(crate) fn warn_unused_options(
    class_name: &str,
    extra: &serde_json::Map<String, serde_json::Value>,
) {
    let unused: Vec<&str> = extra
        .keys()
        .map(String::as_str)
        .filter(|k| *k != "description")
        .collect();
    if !unused.is_empty() {
        tracing::warn!(class_name, keys = ?unused, "ignoring unknown note options");
    }
}

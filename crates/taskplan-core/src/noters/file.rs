//! File notifier: writes the outcome to a file as pretty-printed JSON.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{NoteError, Noter, NotifyCondition, conditions_allow, warn_unused_options};
use crate::domain::{ConfigError, JobOutcome};

#[derive(Debug)]
pub struct FileNotifier {
    path: PathBuf,
    conditions: Vec<NotifyCondition>,
}

#[derive(Debug, Deserialize)]
struct FileOptions {
    path: PathBuf,

    #[serde(default)]
    conditions: Vec<NotifyCondition>,

    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl FileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conditions: Vec::new(),
        }
    }

    pub fn from_options(
        options: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Arc<dyn Noter>, ConfigError> {
        let opts: FileOptions = serde_json::from_value(serde_json::Value::Object(options))
            .map_err(|e| ConfigError::BadNoteOptions {
                class_name: "FileNotifier".to_string(),
                reason: e.to_string(),
            })?;
        warn_unused_options("FileNotifier", &opts.extra);
        Ok(Arc::new(Self {
            path: opts.path,
            conditions: opts.conditions,
        }))
    }
}

#[async_trait]
impl Noter for FileNotifier {
    async fn notify_result(&self, outcome: &JobOutcome) -> Result<(), NoteError> {
        if !conditions_allow(&self.conditions, outcome) {
            return Ok(());
        }
        let mut rendered = serde_json::to_string_pretty(outcome)
            .map_err(|e| NoteError::Other(e.to_string()))?;
        rendered.push('\n');
        tokio::fs::write(&self.path, rendered).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noters::tests::outcome_with_output;

    #[tokio::test]
    async fn writes_outcome_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let noter = FileNotifier::new(&path);

        noter
            .notify_result(&outcome_with_output("hello\n"))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let recorded: JobOutcome = serde_json::from_str(&text).unwrap();
        assert_eq!(recorded.output, "hello\n");
        assert_eq!(recorded.job, "test");
    }

    #[tokio::test]
    async fn suppressed_notification_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let noter = FileNotifier {
            path: path.clone(),
            conditions: vec![NotifyCondition::OnlyIfOutputNonEmpty],
        };

        noter.notify_result(&outcome_with_output("")).await.unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_path_option_is_rejected() {
        let err = FileNotifier::from_options(serde_json::Map::new()).unwrap_err();
        assert!(matches!(err, ConfigError::BadNoteOptions { .. }));
    }
}

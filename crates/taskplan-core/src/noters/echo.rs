//! Echo notifier: prints the outcome to stdout.
//!
//! Also the fallback used when a job has no note configured.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{NoteError, Noter, NotifyCondition, conditions_allow, warn_unused_options};
use crate::domain::{ConfigError, JobOutcome};

#[derive(Debug, Default)]
pub struct EchoNotifier {
    conditions: Vec<NotifyCondition>,
}

#[derive(Debug, Deserialize)]
struct EchoOptions {
    #[serde(default)]
    conditions: Vec<NotifyCondition>,

    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl EchoNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(
        options: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Arc<dyn Noter>, ConfigError> {
        let opts: EchoOptions = serde_json::from_value(serde_json::Value::Object(options))
            .map_err(|e| ConfigError::BadNoteOptions {
                class_name: "EchoNotifier".to_string(),
                reason: e.to_string(),
            })?;
        warn_unused_options("EchoNotifier", &opts.extra);
        Ok(Arc::new(Self {
            conditions: opts.conditions,
        }))
    }
}

#[async_trait]
impl Noter for EchoNotifier {
    async fn notify_result(&self, outcome: &JobOutcome) -> Result<(), NoteError> {
        if !conditions_allow(&self.conditions, outcome) {
            return Ok(());
        }
        println!("{outcome}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_with_conditions() {
        let serde_json::Value::Object(options) =
            json!({ "conditions": ["only_if_output_non_empty"] })
        else {
            unreachable!()
        };
        EchoNotifier::from_options(options).expect("echo notifier builds");
    }

    #[test]
    fn bad_condition_name_is_rejected() {
        let serde_json::Value::Object(options) = json!({ "conditions": ["no_such_condition"] })
        else {
            unreachable!()
        };
        let err = EchoNotifier::from_options(options).unwrap_err();
        assert!(matches!(err, ConfigError::BadNoteOptions { .. }));
    }
}

//! Telegram notifier: sends the outcome via the Bot API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{NoteError, Noter, NotifyCondition, conditions_allow, warn_unused_options};
use crate::domain::{ConfigError, JobOutcome};

fn default_base_url() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Deserialize)]
pub struct TelegramNotifier {
    token: String,

    /// Chat ids are numeric in the Bot API but often quoted in plan files;
    /// accept both.
    chat_id: serde_json::Value,

    #[serde(default = "default_base_url")]
    base_url: String,

    #[serde(default)]
    conditions: Vec<NotifyCondition>,

    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl TelegramNotifier {
    pub fn from_options(
        options: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Arc<dyn Noter>, ConfigError> {
        let notifier: TelegramNotifier =
            serde_json::from_value(serde_json::Value::Object(options)).map_err(|e| {
                ConfigError::BadNoteOptions {
                    class_name: "TelegramNotifier".to_string(),
                    reason: e.to_string(),
                }
            })?;
        warn_unused_options("TelegramNotifier", &notifier.extra);
        Ok(Arc::new(notifier))
    }

    fn chat_id_str(&self) -> String {
        match &self.chat_id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    async fn notify_message(&self, text: &str) -> Result<(), NoteError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let client = reqwest::Client::builder().build()?;
        let response = client
            .post(url)
            .form(&[("chat_id", self.chat_id_str()), ("text", text.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        if body.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            tracing::error!(response = %body, "telegram API rejected the message");
            return Err(NoteError::Other(format!("telegram API error: {body}")));
        }
        tracing::info!("telegram message sent");
        Ok(())
    }
}

#[async_trait]
impl Noter for TelegramNotifier {
    async fn notify_result(&self, outcome: &JobOutcome) -> Result<(), NoteError> {
        if !conditions_allow(&self.conditions, outcome) {
            return Ok(());
        }
        self.notify_message(&outcome.to_string()).await
    }
}

//! Registry of noter constructors (class name -> constructor).
//!
//! Built during initialization (mutable), used during runs (immutable).
//! Class names are validated against the registry at plan-load time.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use super::{EchoNotifier, FileNotifier, Noter, TelegramNotifier};
use crate::domain::{ConfigError, TaskNote};

/// Builds a noter from the note's keyword options.
pub type NoterCtor = Box<
    dyn Fn(serde_json::Map<String, serde_json::Value>) -> Result<Arc<dyn Noter>, ConfigError>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct NoterRegistry {
    ctors: HashMap<String, NoterCtor>,
}

impl NoterRegistry {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registry preloaded with the builtin noter classes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Builtins cannot collide in a fresh registry.
        let _ = registry.register("EchoNotifier", Box::new(EchoNotifier::from_options));
        let _ = registry.register("FileNotifier", Box::new(FileNotifier::from_options));
        let _ = registry.register("TelegramNotifier", Box::new(TelegramNotifier::from_options));
        registry
    }

    /// Register a constructor for a class name.
    ///
    /// If you want "last wins", change this to overwrite instead of error.
    pub fn register(
        &mut self,
        class_name: impl Into<String>,
        ctor: NoterCtor,
    ) -> Result<(), ConfigError> {
        let class_name = class_name.into();
        if self.ctors.contains_key(&class_name) {
            return Err(ConfigError::DuplicateNoterClass(class_name));
        }
        self.ctors.insert(class_name, ctor);
        Ok(())
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.ctors.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }

    /// Build the noter selected by `note`, with its option string values
    /// templated against the job's resolved env vars.
    pub fn build(
        &self,
        note_name: &str,
        note: &TaskNote,
        vars: &IndexMap<String, String>,
    ) -> Result<Arc<dyn Noter>, ConfigError> {
        let ctor =
            self.ctors
                .get(&note.class_name)
                .ok_or_else(|| ConfigError::UnknownNoterClass {
                    note: note_name.to_string(),
                    class_name: note.class_name.clone(),
                })?;
        ctor(template_options(&note.options, vars))
    }
}

/// Substitute `$NAME` references in top-level string option values.
/// Unknown names are left intact.
fn template_options(
    options: &serde_json::Map<String, serde_json::Value>,
    vars: &IndexMap<String, String>,
) -> serde_json::Map<String, serde_json::Value> {
    options
        .iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => serde_json::Value::String(
                    shellexpand::env_with_context_no_errors(s, |name| {
                        vars.get(name).cloned()
                    })
                    .into_owned(),
                ),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

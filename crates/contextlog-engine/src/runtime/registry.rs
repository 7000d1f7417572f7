// Runtime registry
//
// Explicit per-application map of runtimes. Callers own the registry; tests
// build isolated ones.

use std::collections::HashMap;
use std::sync::Arc;

use contextlog_error::{log_error, ConfigError, IntoBoxError, Result, ValidationIssue};
use parking_lot::RwLock;
use tracing::info;

use super::{LoggerRuntime, RuntimeBuilder};
use crate::config::LoggerConfig;

#[derive(Debug, Default)]
pub struct Registry {
    runtimes: RwLock<HashMap<String, Arc<LoggerRuntime>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a started runtime under its application name.
    pub fn register(&self, runtime: LoggerRuntime) -> Result<Arc<LoggerRuntime>> {
        let application = runtime.application().to_string();
        let mut runtimes = self.runtimes.write();
        if runtimes.contains_key(&application) {
            return Err(duplicate(&application).into_box_error());
        }
        let runtime = Arc::new(runtime);
        runtimes.insert(application, Arc::clone(&runtime));
        Ok(runtime)
    }

    /// Build a runtime without sinks and register it.
    pub fn open(&self, config: LoggerConfig) -> Result<Arc<LoggerRuntime>> {
        self.open_with(RuntimeBuilder::new(config))
    }

    pub fn open_with(&self, builder: RuntimeBuilder) -> Result<Arc<LoggerRuntime>> {
        let application = builder.application().trim().to_string();
        if self.runtimes.read().contains_key(&application) {
            return Err(duplicate(&application).into_box_error());
        }
        self.register(builder.build()?)
    }

    pub fn get(&self, application: &str) -> Option<Arc<LoggerRuntime>> {
        self.runtimes.read().get(application).cloned()
    }

    /// Unregister; the runtime closes once the last handle is dropped.
    pub fn remove(&self, application: &str) -> Option<Arc<LoggerRuntime>> {
        self.runtimes.write().remove(application)
    }

    pub fn applications(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runtimes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.runtimes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.read().is_empty()
    }

    /// Close and unregister every runtime. Returns how many were closed.
    pub fn shutdown_all(&self) -> usize {
        let runtimes: Vec<Arc<LoggerRuntime>> =
            self.runtimes.write().drain().map(|(_, runtime)| runtime).collect();
        let count = runtimes.len();
        for runtime in runtimes {
            log_error!(runtime.close(), "runtime did not drain before closing");
        }
        info!(count, "registry shut down");
        count
    }
}

fn duplicate(application: &str) -> ConfigError {
    ConfigError::Invalid(vec![ValidationIssue::new(
        "application_name",
        format!("`{application}` is already registered"),
    )])
}

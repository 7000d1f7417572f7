//! Identity of a producing logger instance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::{bounded, COMPONENT_BUDGET};

/// Application + process + optional tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    application: String,
    process_id: u32,
    tag: Option<String>,
}

impl InstanceId {
    /// Identity for the current process.
    pub fn current(application: &str, tag: Option<&str>) -> Self {
        Self::with_process_id(application, tag, std::process::id())
    }

    pub fn with_process_id(application: &str, tag: Option<&str>, process_id: u32) -> Self {
        InstanceId {
            application: bounded(application, COMPONENT_BUDGET),
            process_id,
            tag: tag.filter(|t| !t.is_empty()).map(|t| bounded(t, COMPONENT_BUDGET)),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}@{}", self.application, tag, self.process_id),
            None => write!(f, "{}@{}", self.application, self.process_id),
        }
    }
}

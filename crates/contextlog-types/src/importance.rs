//! The four-level importance scale that drives every downstream decision.

use std::fmt;
use std::str::FromStr;

use contextlog_error::ParseError;
use serde::{Deserialize, Serialize};

use crate::severity::Severity;

/// Importance assigned by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Importance {
    pub const COUNT: usize = 4;

    /// Levels from least to most important.
    pub const ALL: [Importance; 4] = [
        Importance::Low,
        Importance::Medium,
        Importance::High,
        Importance::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::High => "high",
            Importance::Critical => "critical",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The built-in severity mapping used when no override matches.
    pub fn default_for(severity: Severity) -> Self {
        match severity {
            Severity::Trace | Severity::Debug => Importance::Low,
            Severity::Info => Importance::Medium,
            Severity::Warn => Importance::High,
            Severity::Error | Severity::Critical => Importance::Critical,
        }
    }

    pub fn is_critical(&self) -> bool {
        *self == Importance::Critical
    }
}

impl Default for Importance {
    fn default() -> Self {
        Importance::Low
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Importance::Low),
            "medium" => Ok(Importance::Medium),
            "high" => Ok(Importance::High),
            "critical" => Ok(Importance::Critical),
            _ => Err(ParseError::UnknownImportance(s.to_string())),
        }
    }
}

impl TryFrom<u8> for Importance {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Importance::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| ParseError::UnknownImportance(value.to_string()))
    }
}

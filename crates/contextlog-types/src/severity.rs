//! Severity levels emitted by application code.

use std::fmt;
use std::str::FromStr;

use contextlog_error::ParseError;
use serde::{Deserialize, Serialize};

/// Six-level ordinal attached to every message by the caller.
///
/// Severity is the input to importance resolution, not the decision axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Dense index usable for per-severity tables.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Whether this severity counts toward the error rate.
    pub fn is_error(&self) -> bool {
        *self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            // ERR and ERROR are the same level
            "error" | "err" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            _ => Err(ParseError::UnknownSeverity(s.to_string())),
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, ParseError> {
        Severity::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| ParseError::UnknownSeverity(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!("err".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("Error".parse::<Severity>().unwrap(), Severity::Error);
        assert_eq!("fatal".parse::<Severity>().unwrap(), Severity::Critical);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        assert!("verbose".parse::<Severity>().is_err());
        assert!(Severity::try_from(6u8).is_err());
        assert_eq!(Severity::try_from(5u8).unwrap(), Severity::Critical);
    }

    #[test]
    fn test_every_level_converts_from_its_ordinal() {
        for (ordinal, level) in Severity::ALL.iter().enumerate() {
            let converted: Result<Severity, ParseError> = Severity::try_from(ordinal as u8);
            assert_eq!(converted.unwrap(), *level);
        }
    }

    #[test]
    fn test_ordering_and_error_flag() {
        assert!(Severity::Trace < Severity::Critical);
        assert!(!Severity::Warn.is_error());
        assert!(Severity::Error.is_error());
        assert!(Severity::Critical.is_error());
    }
}

//! Decider output.

use std::fmt;
use std::str::FromStr;

use contextlog_error::ParseError;
use serde::{Deserialize, Serialize};

/// Where a persisted message should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMethod {
    Database,
    File,
    /// Kept in the queue for in-process consumers only
    QueueOnly,
    /// Every enabled sink
    Multi,
}

impl PersistMethod {
    pub const ALL: [PersistMethod; 4] = [
        PersistMethod::Database,
        PersistMethod::File,
        PersistMethod::QueueOnly,
        PersistMethod::Multi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersistMethod::Database => "database",
            PersistMethod::File => "file",
            PersistMethod::QueueOnly => "queue_only",
            PersistMethod::Multi => "multi",
        }
    }
}

impl fmt::Display for PersistMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistMethod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" => Ok(PersistMethod::Database),
            "file" => Ok(PersistMethod::File),
            "queue_only" | "queue" => Ok(PersistMethod::QueueOnly),
            "multi" | "all" => Ok(PersistMethod::Multi),
            _ => Err(ParseError::UnknownMethod(s.to_string())),
        }
    }
}

/// Why a message was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    ForcedCritical,
    Normal,
}

/// Why a message did not reach the queue, or left it without being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Ignored,
    EmergencyFloor,
    Shed,
    BelowMin,
    QueueFull,
    Evicted,
    ShuttingDown,
}

impl DropReason {
    pub const COUNT: usize = 7;

    pub const ALL: [DropReason; 7] = [
        DropReason::Ignored,
        DropReason::EmergencyFloor,
        DropReason::Shed,
        DropReason::BelowMin,
        DropReason::QueueFull,
        DropReason::Evicted,
        DropReason::ShuttingDown,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Ignored => "ignored",
            DropReason::EmergencyFloor => "emergency_floor",
            DropReason::Shed => "shed",
            DropReason::BelowMin => "below_min",
            DropReason::QueueFull => "queue_full",
            DropReason::Evicted => "evicted",
            DropReason::ShuttingDown => "shutting_down",
        }
    }

    /// Reasons the decider itself can produce.
    pub fn is_policy_drop(&self) -> bool {
        matches!(
            self,
            DropReason::Ignored | DropReason::EmergencyFloor | DropReason::Shed | DropReason::BelowMin
        )
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{persist, method, reason}` for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Persist {
        method: PersistMethod,
        reason: DecisionReason,
    },
    Drop {
        reason: DropReason,
    },
}

impl Verdict {
    pub fn persist(method: PersistMethod, reason: DecisionReason) -> Self {
        Verdict::Persist { method, reason }
    }

    pub fn drop(reason: DropReason) -> Self {
        Verdict::Drop { reason }
    }

    pub fn should_persist(&self) -> bool {
        matches!(self, Verdict::Persist { .. })
    }

    pub fn method(&self) -> Option<PersistMethod> {
        match self {
            Verdict::Persist { method, .. } => Some(*method),
            Verdict::Drop { .. } => None,
        }
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            Verdict::Drop { reason } => Some(*reason),
            Verdict::Persist { .. } => None,
        }
    }

    pub fn is_forced_critical(&self) -> bool {
        matches!(
            self,
            Verdict::Persist {
                reason: DecisionReason::ForcedCritical,
                ..
            }
        )
    }
}

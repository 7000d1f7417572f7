//! Core data model for the contextlog runtime.
//!
//! Everything here is plain data: message records, the importance and severity
//! scales, policy records, decision contexts and verdicts. The decision logic
//! lives in `contextlog-engine`.

pub mod context;
pub mod importance;
pub mod instance;
pub mod message;
pub mod pattern;
pub mod policy;
pub mod severity;
pub mod text;
pub mod timestamp;
pub mod trigger;
pub mod verdict;

pub use context::{DecisionContext, StressWeights, SystemSample};
pub use importance::Importance;
pub use instance::InstanceId;
pub use message::{
    current_thread_id, DefaultImportance, LogMessage, MessageId, RawMessage, ResolveImportance,
};
pub use pattern::ComponentPattern;
pub use policy::{
    BatchingConfig, EmergencyConfig, LoadShedding, PersistencePolicy, PolicyPreset, ShedStep,
};
pub use severity::Severity;
pub use timestamp::Timestamp;
pub use trigger::{AdaptiveTrigger, PolicyPatch, TriggerCondition};
pub use verdict::{DecisionReason, DropReason, PersistMethod, Verdict};

// Policy lifecycle
//
// Owns the active policy per application, its rollback history, emergency
// mode, adaptive triggers and the context sampler.

mod emergency;
mod history;
mod manager;
mod triggers;

pub use emergency::EmergencyState;
pub use history::{PolicyHistory, DEFAULT_HISTORY_CAPACITY};
pub use manager::{EvaluationReport, PolicyManager};
pub use triggers::TriggerStatus;

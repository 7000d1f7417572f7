// Producer path
//
// resolve -> decide -> enqueue, with every outcome counted exactly once.

use std::sync::Arc;

use contextlog_types::{
    DropReason, Importance, InstanceId, LogMessage, PersistMethod, RawMessage, Severity, Verdict,
};
use tracing::trace;

use super::instance::ActivityCounters;
use crate::importance::ImportanceResolver;
use crate::persistence::PersistenceDecider;
use crate::policy::PolicyManager;
use crate::queue::{EnqueueOutcome, SmartQueue};
use crate::stats::StatsRecorder;

/// Component used for messages the runtime emits about itself.
pub const INTERNAL_COMPONENT: &str = "contextlog";

/// What happened to one `log` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    /// Accepted; `evicted` is set when a less important entry made room
    Queued { sequence: u64, evicted: bool },
    Dropped(DropReason),
}

impl LogOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, LogOutcome::Queued { .. })
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            LogOutcome::Dropped(reason) => Some(*reason),
            LogOutcome::Queued { .. } => None,
        }
    }
}

/// State shared by producers, workers and the evaluator.
pub(crate) struct Pipeline {
    pub(crate) instance: Arc<InstanceId>,
    pub(crate) decider: PersistenceDecider<Arc<ImportanceResolver>>,
    pub(crate) manager: Arc<PolicyManager>,
    pub(crate) queue: Arc<SmartQueue>,
    pub(crate) stats: Arc<StatsRecorder>,
    pub(crate) activity: ActivityCounters,
}

impl Pipeline {
    pub(crate) fn log(
        &self,
        severity: Severity,
        component: &str,
        function: &str,
        text: &str,
        location: Option<(&str, u32)>,
    ) -> LogOutcome {
        let mut raw = RawMessage::new(Arc::clone(&self.instance), severity, component, function, text);
        if let Some((file, line)) = location {
            raw = raw.with_location(file, line);
        }

        let is_error = severity.is_error();
        self.activity.record(is_error);
        if is_error {
            self.manager.record_error();
        }

        let ctx = self.manager.decision_context();
        let policy = self.manager.policy();
        let (message, verdict) = self.decider.evaluate(raw, &ctx, &policy);
        self.stats
            .record_decision(message.importance(), verdict.is_forced_critical());

        match verdict {
            Verdict::Persist { method, .. } => self.enqueue(message, method),
            Verdict::Drop { reason } => {
                self.stats.record_drop(reason);
                trace!(component = message.component(), reason = reason.as_str(), "message dropped");
                LogOutcome::Dropped(reason)
            }
        }
    }

    /// Queue a runtime notice, bypassing resolution and the decider.
    pub(crate) fn notice(&self, importance: Importance, text: &str) -> LogOutcome {
        let severity = if importance.is_critical() {
            Severity::Critical
        } else {
            Severity::Warn
        };
        let message = RawMessage::new(
            Arc::clone(&self.instance),
            severity,
            INTERNAL_COMPONENT,
            "notice",
            text,
        )
        .into_resolved(importance);

        let policy = self.manager.policy();
        let method = if importance.is_critical() {
            policy.critical_method
        } else {
            policy.default_method
        };
        self.stats.record_decision(importance, false);
        self.stats.record_notice();
        self.enqueue(message, method)
    }

    fn enqueue(&self, message: LogMessage, method: PersistMethod) -> LogOutcome {
        match self.queue.enqueue(Arc::new(message), method) {
            EnqueueOutcome::Enqueued { sequence, evicted } => {
                self.stats.record_accepted();
                if evicted.is_some() {
                    self.stats.record_evicted(1);
                }
                LogOutcome::Queued {
                    sequence,
                    evicted: evicted.is_some(),
                }
            }
            EnqueueOutcome::Rejected(reason) => {
                self.stats.record_drop(reason);
                LogOutcome::Dropped(reason)
            }
        }
    }
}

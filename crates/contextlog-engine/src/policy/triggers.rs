// Runtime state of adaptive triggers
//
// Trigger definitions live in the policy. Activation counts, cooldowns and
// faults are tracked here by trigger id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use contextlog_types::AdaptiveTrigger;
use serde::Serialize;

#[derive(Debug, Default, Clone)]
struct TriggerState {
    activations: u64,
    last_fired: Option<Instant>,
    fault: Option<String>,
}

/// A trigger together with its runtime state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerStatus {
    pub trigger: AdaptiveTrigger,
    pub activations: u64,
    /// Set when evaluation disabled the trigger
    pub fault: Option<String>,
}

impl TriggerStatus {
    pub fn is_active(&self) -> bool {
        self.trigger.enabled && self.fault.is_none()
    }
}

#[derive(Debug, Default)]
pub(crate) struct TriggerBook {
    states: HashMap<u32, TriggerState>,
}

impl TriggerBook {
    pub(crate) fn is_faulted(&self, id: u32) -> bool {
        self.states.get(&id).is_some_and(|s| s.fault.is_some())
    }

    pub(crate) fn cooling_down(&self, trigger: &AdaptiveTrigger, now: Instant) -> bool {
        self.states
            .get(&trigger.id)
            .and_then(|s| s.last_fired)
            .is_some_and(|at| now.duration_since(at) < Duration::from_millis(trigger.cooldown_ms))
    }

    pub(crate) fn fired(&mut self, id: u32, now: Instant) {
        let state = self.states.entry(id).or_default();
        state.activations += 1;
        state.last_fired = Some(now);
    }

    pub(crate) fn fault(&mut self, id: u32, reason: String) {
        self.states.entry(id).or_default().fault = Some(reason);
    }

    pub(crate) fn clear_fault(&mut self, id: u32) {
        if let Some(state) = self.states.get_mut(&id) {
            state.fault = None;
        }
    }

    pub(crate) fn forget(&mut self, id: u32) {
        self.states.remove(&id);
    }

    pub(crate) fn reset(&mut self) {
        self.states.clear();
    }

    pub(crate) fn status(&self, trigger: &AdaptiveTrigger) -> TriggerStatus {
        let state = self.states.get(&trigger.id).cloned().unwrap_or_default();
        TriggerStatus {
            trigger: trigger.clone(),
            activations: state.activations,
            fault: state.fault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextlog_types::{PolicyPatch, TriggerCondition};

    #[test]
    fn test_cooldown_and_faults() {
        let trigger = AdaptiveTrigger::new(
            3,
            "hot",
            TriggerCondition::default().stress_at_least(50.0),
            PolicyPatch::default(),
        )
        .with_cooldown_ms(1_000);
        let mut book = TriggerBook::default();
        let now = Instant::now();
        assert!(!book.cooling_down(&trigger, now));
        book.fired(3, now);
        assert!(book.cooling_down(&trigger, now + Duration::from_millis(500)));
        assert!(!book.cooling_down(&trigger, now + Duration::from_millis(1_500)));

        book.fault(3, "bad".into());
        assert!(book.is_faulted(3));
        let status = book.status(&trigger);
        assert_eq!(status.activations, 1);
        assert!(!status.is_active());
        book.clear_fault(3);
        assert!(book.status(&trigger).is_active());
    }
}

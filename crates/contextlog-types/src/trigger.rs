// Adaptive triggers
//
// A trigger pairs a condition over the sampled context with a patch that is
// merged onto the active policy when the condition holds.

use serde::{Deserialize, Serialize};

use crate::context::DecisionContext;
use crate::importance::Importance;
use crate::policy::{BatchingConfig, LoadShedding, PersistencePolicy};
use crate::verdict::PersistMethod;

/// Every threshold that is set must hold for the condition to fire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerCondition {
    pub min_stress: Option<f64>,
    /// Errors per second
    pub min_error_rate: Option<f64>,
    /// Queue occupancy ratio in 0..=1
    pub min_queue_fill: Option<f64>,
}

impl TriggerCondition {
    pub fn stress_at_least(mut self, stress: f64) -> Self {
        self.min_stress = Some(stress);
        self
    }

    pub fn error_rate_at_least(mut self, rate: f64) -> Self {
        self.min_error_rate = Some(rate);
        self
    }

    pub fn queue_fill_at_least(mut self, fill: f64) -> Self {
        self.min_queue_fill = Some(fill);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.min_stress.is_none() && self.min_error_rate.is_none() && self.min_queue_fill.is_none()
    }

    /// Structural check; a condition that fails it is never evaluated.
    pub fn check(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("condition has no thresholds".to_string());
        }
        if let Some(s) = self.min_stress {
            if !s.is_finite() || !(0.0..=100.0).contains(&s) {
                return Err(format!("stress threshold {s} outside 0..=100"));
            }
        }
        if let Some(r) = self.min_error_rate {
            if !r.is_finite() || r < 0.0 {
                return Err(format!("error rate threshold {r} is not a non-negative number"));
            }
        }
        if let Some(q) = self.min_queue_fill {
            if !q.is_finite() || !(0.0..=1.0).contains(&q) {
                return Err(format!("queue fill threshold {q} outside 0..=1"));
            }
        }
        Ok(())
    }

    pub fn matches(&self, ctx: &DecisionContext) -> bool {
        self.min_stress.map_or(true, |s| ctx.stress >= s)
            && self.min_error_rate.map_or(true, |r| ctx.error_rate >= r)
            && self.min_queue_fill.map_or(true, |q| ctx.queue_fill >= q)
    }
}

/// Fields to overwrite on the active policy. `None` leaves a field alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyPatch {
    pub min_persist_importance: Option<Importance>,
    pub load_shedding: Option<LoadShedding>,
    pub batching: Option<BatchingConfig>,
    pub default_method: Option<PersistMethod>,
    pub add_critical_components: Vec<String>,
    pub add_ignored_components: Vec<String>,
    /// Arm emergency mode for this many seconds
    pub enter_emergency_s: Option<u64>,
}

impl PolicyPatch {
    pub fn min_importance(mut self, importance: Importance) -> Self {
        self.min_persist_importance = Some(importance);
        self
    }

    pub fn shedding(mut self, shedding: LoadShedding) -> Self {
        self.load_shedding = Some(shedding);
        self
    }

    pub fn method(mut self, method: PersistMethod) -> Self {
        self.default_method = Some(method);
        self
    }

    pub fn critical_component(mut self, pattern: &str) -> Self {
        self.add_critical_components.push(pattern.to_string());
        self
    }

    pub fn ignored_component(mut self, pattern: &str) -> Self {
        self.add_ignored_components.push(pattern.to_string());
        self
    }

    pub fn emergency_for(mut self, seconds: u64) -> Self {
        self.enter_emergency_s = Some(seconds);
        self
    }

    /// Produce the patched copy. The caller validates the result.
    pub fn apply(&self, policy: &PersistencePolicy) -> PersistencePolicy {
        let mut next = policy.clone();
        if let Some(importance) = self.min_persist_importance {
            next.min_persist_importance = importance;
        }
        if let Some(shedding) = &self.load_shedding {
            next.load_shedding = shedding.clone();
        }
        if let Some(batching) = self.batching {
            next.batching = batching;
        }
        if let Some(method) = self.default_method {
            next.default_method = method;
        }
        for pattern in &self.add_critical_components {
            if !next.critical_components.contains(pattern) {
                next.critical_components.push(pattern.clone());
            }
        }
        for pattern in &self.add_ignored_components {
            if !next.ignored_components.contains(pattern) {
                next.ignored_components.push(pattern.clone());
            }
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveTrigger {
    pub id: u32,
    pub name: String,
    pub condition: TriggerCondition,
    pub patch: PolicyPatch,
    /// Minimum time between two firings
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_enabled() -> bool {
    true
}

impl AdaptiveTrigger {
    pub fn new(id: u32, name: &str, condition: TriggerCondition, patch: PolicyPatch) -> Self {
        AdaptiveTrigger {
            id,
            name: name.to_string(),
            condition,
            patch,
            cooldown_ms: default_cooldown_ms(),
            enabled: true,
        }
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }
}

// Decision context
//
// A `SystemSample` is what the probe reports. The manager folds it into a
// `DecisionContext` with a single stress scalar, which the decider reads by value.

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Raw system metrics, all percentages in 0..=100 except `error_rate` (errors/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub error_rate: f64,
}

impl SystemSample {
    pub fn new(cpu_percent: f64, memory_percent: f64, disk_percent: f64, error_rate: f64) -> Self {
        SystemSample {
            cpu_percent,
            memory_percent,
            disk_percent,
            error_rate,
        }
    }

    /// Replace NaN and out-of-range values so the stress formula stays bounded.
    pub fn sanitized(self) -> Self {
        SystemSample {
            cpu_percent: clamp_percent(self.cpu_percent),
            memory_percent: clamp_percent(self.memory_percent),
            disk_percent: clamp_percent(self.disk_percent),
            error_rate: if self.error_rate.is_finite() {
                self.error_rate.max(0.0)
            } else {
                0.0
            },
        }
    }
}

/// Weights of the stress weighted max.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressWeights {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub error_rate: f64,
    /// Error rate (errors/s) that normalizes to 100
    pub error_rate_full_scale: f64,
}

impl Default for StressWeights {
    fn default() -> Self {
        StressWeights {
            cpu: 1.0,
            memory: 1.0,
            disk: 0.5,
            error_rate: 0.8,
            error_rate_full_scale: 50.0,
        }
    }
}

impl StressWeights {
    /// `max(cpu*w, mem*w, disk*w, norm(err)*w)` clamped to 0..=100.
    pub fn stress(&self, sample: &SystemSample) -> f64 {
        let sample = sample.sanitized();
        let err_norm = if self.error_rate_full_scale > 0.0 {
            (sample.error_rate / self.error_rate_full_scale * 100.0).min(100.0)
        } else {
            0.0
        };
        let stress = (sample.cpu_percent * self.cpu)
            .max(sample.memory_percent * self.memory)
            .max(sample.disk_percent * self.disk)
            .max(err_norm * self.error_rate);
        clamp_percent(stress)
    }
}

/// Snapshot consulted by the decider for one decision or one batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub stress: f64,
    pub error_rate: f64,
    pub in_emergency: bool,
    /// Queue occupancy in 0..=1 at sampling time
    pub queue_fill: f64,
    pub now: Timestamp,
}

impl DecisionContext {
    pub fn new(stress: f64, error_rate: f64, in_emergency: bool) -> Self {
        DecisionContext {
            stress: clamp_percent(stress),
            error_rate: error_rate.max(0.0),
            in_emergency,
            queue_fill: 0.0,
            now: Timestamp::now(),
        }
    }

    /// No load, no emergency.
    pub fn calm() -> Self {
        Self::new(0.0, 0.0, false)
    }

    pub fn with_queue_fill(mut self, fill: f64) -> Self {
        self.queue_fill = if fill.is_finite() { fill.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    pub fn with_emergency(mut self, in_emergency: bool) -> Self {
        self.in_emergency = in_emergency;
        self
    }
}

impl Default for DecisionContext {
    fn default() -> Self {
        Self::calm()
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

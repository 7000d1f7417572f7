// Rate-limited context sampler
//
// Wraps the probe with a cache: callers inside `min_interval` get the cached
// metrics. Probe failures fall back to the last good sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contextlog_types::{DecisionContext, StressWeights, SystemSample};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error_rate::ErrorRateWindow;
use super::probe::SystemProbe;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    #[serde(with = "crate::config::duration_ms")]
    pub min_interval: Duration,
    #[serde(with = "crate::config::duration_ms")]
    pub error_window: Duration,
    pub weights: StressWeights,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            min_interval: Duration::from_millis(100),
            error_window: Duration::from_secs(10),
            weights: StressWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cached {
    taken_at: Instant,
    sample: SystemSample,
    stress: f64,
}

pub struct ContextSampler {
    probe: Box<dyn SystemProbe>,
    config: SamplerConfig,
    errors: ErrorRateWindow,
    pending_errors: Arc<AtomicU64>,
    last_good: SystemSample,
    cached: Option<Cached>,
    probe_failures: u64,
}

impl ContextSampler {
    pub fn new(probe: Box<dyn SystemProbe>, config: SamplerConfig) -> Self {
        ContextSampler {
            probe,
            errors: ErrorRateWindow::new(config.error_window),
            config,
            pending_errors: Arc::new(AtomicU64::new(0)),
            last_good: SystemSample::default(),
            cached: None,
            probe_failures: 0,
        }
    }

    /// Counter producers bump for every error-severity message.
    pub fn error_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.pending_errors)
    }

    /// Context for a decision; metrics are re-read at most once per `min_interval`.
    pub fn sample(&mut self, in_emergency: bool, queue_fill: f64) -> DecisionContext {
        let now = Instant::now();
        let fresh = self
            .cached
            .filter(|c| now.duration_since(c.taken_at) < self.config.min_interval);
        let cached = match fresh {
            Some(cached) => cached,
            None => self.refresh(now),
        };
        let mut ctx = DecisionContext::new(cached.stress, cached.sample.error_rate, in_emergency);
        ctx = ctx.with_queue_fill(queue_fill);
        ctx
    }

    /// Bypass the rate limit.
    pub fn force_sample(&mut self, in_emergency: bool, queue_fill: f64) -> DecisionContext {
        self.cached = None;
        self.sample(in_emergency, queue_fill)
    }

    fn refresh(&mut self, now: Instant) -> Cached {
        let logged = self.pending_errors.swap(0, Ordering::Relaxed);
        if logged > 0 {
            self.errors.record_at(now, logged);
        }

        let probed = match self.probe.sample() {
            Ok(sample) => {
                let sample = sample.sanitized();
                self.last_good = sample;
                sample
            }
            Err(err) => {
                self.probe_failures += 1;
                warn!(probe = self.probe.name(), error = %err, "probe failed, reusing last good sample");
                self.last_good
            }
        };

        let mut sample = probed;
        sample.error_rate = probed.error_rate.max(self.errors.rate_at(now));
        let stress = self.config.weights.stress(&sample);
        debug!(stress, cpu = sample.cpu_percent, memory = sample.memory_percent, error_rate = sample.error_rate, "context sampled");

        let cached = Cached {
            taken_at: now,
            sample,
            stress,
        };
        self.cached = Some(cached);
        cached
    }

    pub fn last_sample(&self) -> SystemSample {
        self.cached.map(|c| c.sample).unwrap_or(self.last_good)
    }

    pub fn probe_failures(&self) -> u64 {
        self.probe_failures
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }
}

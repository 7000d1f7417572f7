// Background evaluator
//
// Samples the context at the sampler's cadence and runs the adaptive
// evaluation every `interval`. Queue hints (stress trimming, age eviction)
// follow each evaluation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contextlog_types::Importance;
use tracing::{debug, info};

use super::pipeline::Pipeline;
use crate::policy::EvaluationReport;

const MIN_TICK: Duration = Duration::from_millis(10);

pub(crate) struct Evaluator {
    stop_signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("interval", &self.interval)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl Evaluator {
    pub(crate) fn start(
        pipeline: Arc<Pipeline>,
        interval: Duration,
        tick: Duration,
    ) -> std::io::Result<Self> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_signal);
        let tick = tick.clamp(MIN_TICK, interval.max(MIN_TICK));
        let name = format!("contextlog-{}-evaluator", pipeline.instance.application());

        let handle = thread::Builder::new().name(name).spawn(move || {
            // `None` when the interval is too large to ever come due
            let mut next_evaluation = Instant::now().checked_add(interval);
            while !stop.load(Ordering::Acquire) {
                thread::park_timeout(tick);
                if stop.load(Ordering::Acquire) {
                    break;
                }
                if next_evaluation.is_some_and(|at| Instant::now() >= at) {
                    evaluate(&pipeline);
                    next_evaluation = Instant::now().checked_add(interval);
                } else {
                    pipeline.manager.sample_context(pipeline.queue.fill_ratio());
                }
            }
            debug!("evaluator stopped");
        })?;

        info!(interval_ms = interval.as_millis() as u64, "evaluator started");
        Ok(Evaluator {
            stop_signal,
            handle: Some(handle),
            interval,
        })
    }

    pub(crate) fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for Evaluator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One full evaluation plus the queue maintenance that follows it.
pub(crate) fn evaluate(pipeline: &Pipeline) -> EvaluationReport {
    let report = pipeline.manager.evaluate(pipeline.queue.fill_ratio());

    let trimmed = pipeline.queue.optimize_for_stress(report.context.stress);
    pipeline.stats.record_evicted(trimmed.len() as u64);

    if let Some(max_age_s) = pipeline.manager.policy().max_age_s {
        let aged = pipeline
            .queue
            .evict_older_than(Duration::from_secs(max_age_s));
        pipeline.stats.record_evicted(aged.len() as u64);
    }

    for (id, reason) in &report.disabled_triggers {
        pipeline.notice(
            Importance::High,
            &format!("adaptive trigger {id} disabled: {reason}"),
        );
    }

    report
}

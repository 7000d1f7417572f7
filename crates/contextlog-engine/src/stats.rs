// Runtime statistics
//
// Hot-path counters are relaxed atomics. Latency windows and the stress
// average sit behind short mutexes and are only touched by workers and the
// evaluator. `snapshot` reads everything without blocking producers.
//
// Conservation: every decision ends up either accepted into the queue or in
// one drop bucket; an accepted message that is later evicted moves to the
// `evicted` bucket, so decisions == persisted + sum(dropped) once quiescent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contextlog_types::{DropReason, Importance};
use parking_lot::Mutex;
use serde::Serialize;

/// Samples kept per latency window.
pub const LATENCY_WINDOW: usize = 1024;
/// Weight of the newest sample in the stress average.
pub const STRESS_EWMA_ALPHA: f64 = 0.2;

/// Last `capacity` latency samples, in microseconds.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        LatencyWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency.as_micros().min(u64::MAX as u128) as u64);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn summary(&self) -> LatencySummary {
        if self.samples.is_empty() {
            return LatencySummary::default();
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let count = sorted.len();
        let sum: u128 = sorted.iter().map(|&v| v as u128).sum();
        // nearest-rank p95
        let rank = (count * 95).div_ceil(100);
        LatencySummary {
            samples: count,
            mean_us: (sum / count as u128) as u64,
            p95_us: sorted[rank.clamp(1, count) - 1],
            max_us: sorted[count - 1],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean_us: u64,
    pub p95_us: u64,
    pub max_us: u64,
}

/// Dropped-message counts by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub ignored: u64,
    pub emergency_floor: u64,
    pub shed: u64,
    pub below_min: u64,
    pub queue_full: u64,
    pub evicted: u64,
    pub shutting_down: u64,
}

impl DropCounts {
    pub fn get(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::Ignored => self.ignored,
            DropReason::EmergencyFloor => self.emergency_floor,
            DropReason::Shed => self.shed,
            DropReason::BelowMin => self.below_min,
            DropReason::QueueFull => self.queue_full,
            DropReason::Evicted => self.evicted,
            DropReason::ShuttingDown => self.shutting_down,
        }
    }

    pub fn total(&self) -> u64 {
        DropReason::ALL.iter().map(|r| self.get(*r)).sum()
    }
}

/// Value copy of the statistics at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_decisions: u64,
    pub total_persisted: u64,
    pub total_dropped: DropCounts,
    pub forced_critical: u64,
    /// Decisions per resolved importance, indexed low..critical
    pub decisions_by_importance: [u64; Importance::COUNT],
    pub accepted: u64,
    pub dequeued: u64,
    pub written: u64,
    pub write_failures: u64,
    pub sink_retries: u64,
    pub disabled_sinks: u64,
    pub internal_notices: u64,
    pub queue_wait: LatencySummary,
    pub persistence_latency: LatencySummary,
    pub stress_average: f64,
    pub last_stress: f64,
}

#[derive(Debug)]
struct StressAverage {
    average: Option<f64>,
    last: f64,
}

#[derive(Debug)]
pub struct StatsRecorder {
    decisions: AtomicU64,
    by_importance: [AtomicU64; Importance::COUNT],
    forced_critical: AtomicU64,
    accepted: AtomicU64,
    evicted: AtomicU64,
    dropped: [AtomicU64; DropReason::COUNT],
    dequeued: AtomicU64,
    written: AtomicU64,
    write_failures: AtomicU64,
    retries: AtomicU64,
    disabled_sinks: AtomicU64,
    notices: AtomicU64,
    queue_wait: Mutex<LatencyWindow>,
    persistence: Mutex<LatencyWindow>,
    stress: Mutex<StressAverage>,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRecorder {
    pub fn new() -> Self {
        StatsRecorder {
            decisions: AtomicU64::new(0),
            by_importance: Default::default(),
            forced_critical: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            dropped: Default::default(),
            dequeued: AtomicU64::new(0),
            written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            disabled_sinks: AtomicU64::new(0),
            notices: AtomicU64::new(0),
            queue_wait: Mutex::new(LatencyWindow::new(LATENCY_WINDOW)),
            persistence: Mutex::new(LatencyWindow::new(LATENCY_WINDOW)),
            stress: Mutex::new(StressAverage {
                average: None,
                last: 0.0,
            }),
        }
    }

    pub fn record_decision(&self, importance: Importance, forced_critical: bool) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
        self.by_importance[importance.index()].fetch_add(1, Ordering::Relaxed);
        if forced_critical {
            self.forced_critical.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_drop(&self, reason: DropReason) {
        self.dropped[reason.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Previously accepted messages removed from the queue before delivery.
    pub fn record_evicted(&self, count: u64) {
        if count > 0 {
            self.evicted.fetch_add(count, Ordering::Relaxed);
            self.dropped[DropReason::Evicted.index()].fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_dequeued(&self, count: u64, waits: impl IntoIterator<Item = Duration>) {
        self.dequeued.fetch_add(count, Ordering::Relaxed);
        let mut window = self.queue_wait.lock();
        for wait in waits {
            window.record(wait);
        }
    }

    /// One latency per delivered message, measured from enqueue.
    pub fn record_written(&self, latencies: impl IntoIterator<Item = Duration>) {
        let mut window = self.persistence.lock();
        let mut count = 0;
        for latency in latencies {
            window.record(latency);
            count += 1;
        }
        self.written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self, count: u64) {
        self.write_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_disabled(&self) {
        self.disabled_sinks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notice(&self) {
        self.notices.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold a stress sample into the moving average.
    pub fn record_stress(&self, stress: f64) {
        let mut s = self.stress.lock();
        s.last = stress;
        s.average = Some(match s.average {
            Some(avg) => avg + STRESS_EWMA_ALPHA * (stress - avg),
            None => stress,
        });
    }

    pub fn total_decisions(&self) -> u64 {
        self.decisions.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        let dropped = |r: DropReason| load(&self.dropped[r.index()]);
        let accepted = load(&self.accepted);
        let (stress_average, last_stress) = {
            let s = self.stress.lock();
            (s.average.unwrap_or(0.0), s.last)
        };

        StatsSnapshot {
            total_decisions: load(&self.decisions),
            total_persisted: accepted.saturating_sub(load(&self.evicted)),
            total_dropped: DropCounts {
                ignored: dropped(DropReason::Ignored),
                emergency_floor: dropped(DropReason::EmergencyFloor),
                shed: dropped(DropReason::Shed),
                below_min: dropped(DropReason::BelowMin),
                queue_full: dropped(DropReason::QueueFull),
                evicted: dropped(DropReason::Evicted),
                shutting_down: dropped(DropReason::ShuttingDown),
            },
            forced_critical: load(&self.forced_critical),
            decisions_by_importance: [0, 1, 2, 3].map(|i| load(&self.by_importance[i])),
            accepted,
            dequeued: load(&self.dequeued),
            written: load(&self.written),
            write_failures: load(&self.write_failures),
            sink_retries: load(&self.retries),
            disabled_sinks: load(&self.disabled_sinks),
            internal_notices: load(&self.notices),
            queue_wait: self.queue_wait.lock().summary(),
            persistence_latency: self.persistence.lock().summary(),
            stress_average,
            last_stress,
        }
    }
}

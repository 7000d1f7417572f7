// Per-instance activity counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use contextlog_types::{InstanceId, Timestamp};
use serde::Serialize;

/// Identity and activity of one runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceInfo {
    pub instance: InstanceId,
    pub started_at: Timestamp,
    pub uptime: Duration,
    pub messages_logged: u64,
    pub errors_logged: u64,
    pub messages_per_second: f64,
    pub errors_per_second: f64,
}

#[derive(Debug)]
pub(crate) struct ActivityCounters {
    started: Instant,
    started_at: Timestamp,
    messages: AtomicU64,
    errors: AtomicU64,
}

impl ActivityCounters {
    pub(crate) fn new() -> Self {
        ActivityCounters {
            started: Instant::now(),
            started_at: Timestamp::now(),
            messages: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn record(&self, is_error: bool) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn info(&self, instance: &InstanceId) -> InstanceInfo {
        let uptime = self.started.elapsed();
        let messages = self.messages.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let seconds = uptime.as_secs_f64();
        let rate = |count: u64| if seconds > 0.0 { count as f64 / seconds } else { 0.0 };

        InstanceInfo {
            instance: instance.clone(),
            started_at: self.started_at,
            uptime,
            messages_logged: messages,
            errors_logged: errors,
            messages_per_second: rate(messages),
            errors_per_second: rate(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = ActivityCounters::new();
        counters.record(false);
        counters.record(true);
        counters.record(true);

        let info = counters.info(&InstanceId::with_process_id("svc", None, 7));
        assert_eq!(info.messages_logged, 3);
        assert_eq!(info.errors_logged, 2);
        assert_eq!(info.instance.process_id(), 7);
        assert!(info.messages_per_second >= info.errors_per_second);
    }
}

// Trailing error-rate window
//
// Counts error-severity messages in one-second buckets over a short trailing
// window. Timestamps are passed in so tests can drive time explicitly.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ErrorRateWindow {
    window: Duration,
    buckets: VecDeque<(Instant, u64)>,
}

const BUCKET: Duration = Duration::from_secs(1);

impl ErrorRateWindow {
    pub fn new(window: Duration) -> Self {
        ErrorRateWindow {
            window: window.max(BUCKET),
            buckets: VecDeque::new(),
        }
    }

    pub fn record_at(&mut self, now: Instant, count: u64) {
        self.prune(now);
        match self.buckets.back_mut() {
            Some((start, n)) if now.duration_since(*start) < BUCKET => *n += count,
            _ => self.buckets.push_back((now, count)),
        }
    }

    pub fn record(&mut self, count: u64) {
        self.record_at(Instant::now(), count);
    }

    /// Errors per second over the window.
    pub fn rate_at(&mut self, now: Instant) -> f64 {
        self.prune(now);
        let total: u64 = self.buckets.iter().map(|(_, n)| n).sum();
        total as f64 / self.window.as_secs_f64()
    }

    pub fn rate(&mut self) -> f64 {
        self.rate_at(Instant::now())
    }

    fn prune(&mut self, now: Instant) {
        while let Some((start, _)) = self.buckets.front() {
            if now.saturating_duration_since(*start) >= self.window {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for ErrorRateWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_over_window() {
        let start = Instant::now();
        let mut window = ErrorRateWindow::new(Duration::from_secs(10));
        window.record_at(start, 30);
        window.record_at(start + Duration::from_secs(2), 20);
        assert_eq!(window.rate_at(start + Duration::from_secs(3)), 5.0);
    }

    #[test]
    fn test_old_buckets_expire() {
        let start = Instant::now();
        let mut window = ErrorRateWindow::new(Duration::from_secs(5));
        window.record_at(start, 100);
        assert_eq!(window.rate_at(start + Duration::from_secs(5)), 0.0);
    }
}

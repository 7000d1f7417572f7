// Priority-bucketed bounded queue
//
// A single mutex guards all four levels; a condvar wakes consumers and a
// second one wakes `wait_drained`. No I/O happens under the lock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contextlog_error::{QueueError, QueueResult};
use contextlog_types::{DropReason, Importance, LogMessage, PersistMethod};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

/// Bulk shedding starts at this stress.
const STRESS_SHED_THRESHOLD: f64 = 80.0;
/// Above this stress the bulk-shed floor rises to high.
const STRESS_SHED_SEVERE: f64 = 90.0;
/// At most this fraction of the queue is removed per `optimize_for_stress` call.
const STRESS_SHED_MAX_FRACTION: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub importance: Importance,
    pub sequence: u64,
    pub message: Arc<LogMessage>,
    pub method: PersistMethod,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn waited(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

#[derive(Debug)]
pub enum EnqueueOutcome {
    /// Stored; `evicted` is the lower-importance entry removed to make room
    Enqueued {
        sequence: u64,
        evicted: Option<QueueEntry>,
    },
    /// `QueueFull` or `ShuttingDown`
    Rejected(DropReason),
}

impl EnqueueOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, EnqueueOutcome::Enqueued { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub rejected: u64,
    pub evicted_for_room: u64,
    pub evicted_for_stress: u64,
    pub evicted_for_age: u64,
    pub peak_size: usize,
}

impl QueueStats {
    pub fn evicted(&self) -> u64 {
        self.evicted_for_room + self.evicted_for_stress + self.evicted_for_age
    }
}

#[derive(Debug, Default)]
struct Inner {
    levels: [VecDeque<QueueEntry>; Importance::COUNT],
    len: usize,
    next_sequence: u64,
    /// Enqueued and not yet completed by a consumer
    outstanding: usize,
    shut_down: bool,
    stats: QueueStats,
}

impl Inner {
    fn pop_highest(&mut self) -> Option<QueueEntry> {
        let entry = self.levels.iter_mut().rev().find_map(|level| level.pop_front())?;
        self.len -= 1;
        self.stats.dequeued += 1;
        Some(entry)
    }

    /// Oldest entry of the lowest non-empty level strictly below `importance`.
    fn evict_below(&mut self, importance: Importance) -> Option<QueueEntry> {
        let entry = self.levels[..importance.index()]
            .iter_mut()
            .find_map(|level| level.pop_front())?;
        self.len -= 1;
        self.outstanding -= 1;
        Some(entry)
    }
}

pub struct SmartQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    drained: Condvar,
    capacity: usize,
}

impl std::fmt::Debug for SmartQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartQueue")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish()
    }
}

impl SmartQueue {
    pub fn new(capacity: usize) -> Self {
        SmartQueue {
            inner: Mutex::new(Inner {
                next_sequence: 1,
                ..Default::default()
            }),
            not_empty: Condvar::new(),
            drained: Condvar::new(),
            capacity,
        }
    }

    /// Store a message, evicting a strictly less important one if full.
    pub fn enqueue(&self, message: Arc<LogMessage>, method: PersistMethod) -> EnqueueOutcome {
        let importance = message.importance();
        let mut inner = self.inner.lock();

        if inner.shut_down {
            inner.stats.rejected += 1;
            return EnqueueOutcome::Rejected(DropReason::ShuttingDown);
        }

        let mut evicted = None;
        if inner.len >= self.capacity {
            match inner.evict_below(importance) {
                Some(victim) => {
                    inner.stats.evicted_for_room += 1;
                    evicted = Some(victim);
                }
                None => {
                    inner.stats.rejected += 1;
                    return EnqueueOutcome::Rejected(DropReason::QueueFull);
                }
            }
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.levels[importance.index()].push_back(QueueEntry {
            importance,
            sequence,
            message,
            method,
            enqueued_at: Instant::now(),
        });
        inner.len += 1;
        inner.outstanding += 1;
        inner.stats.enqueued += 1;
        inner.stats.peak_size = inner.stats.peak_size.max(inner.len);
        drop(inner);

        self.not_empty.notify_one();
        EnqueueOutcome::Enqueued { sequence, evicted }
    }

    /// Highest-importance, oldest entry; waits up to `timeout`.
    ///
    /// After shutdown the remaining entries are still handed out, then `None`.
    pub fn dequeue(&self, timeout: Duration) -> Option<QueueEntry> {
        // a timeout too large for `Instant` waits without a deadline
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        loop {
            if let Some(entry) = inner.pop_highest() {
                self.notify_if_drained(&inner);
                return Some(entry);
            }
            if inner.shut_down {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                        return inner.pop_highest();
                    }
                }
                None => self.not_empty.wait(&mut inner),
            }
        }
    }

    /// Wait for one entry like `dequeue`, then take up to `max - 1` more without waiting.
    pub fn dequeue_batch(&self, max: usize, timeout: Duration) -> Vec<QueueEntry> {
        if max == 0 {
            return Vec::new();
        }
        let Some(first) = self.dequeue(timeout) else {
            return Vec::new();
        };
        let mut batch = Vec::with_capacity(max.min(64));
        batch.push(first);
        let mut inner = self.inner.lock();
        while batch.len() < max {
            match inner.pop_highest() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        batch
    }

    /// What `dequeue` would return next, without removing it.
    pub fn peek(&self) -> Option<QueueEntry> {
        let inner = self.inner.lock();
        inner.levels.iter().rev().find_map(|level| level.front().cloned())
    }

    /// Bulk-shed below a stress-derived floor. Returns the removed entries.
    ///
    /// Nothing happens below stress 80. Removes at most half the queue and
    /// never touches critical entries.
    pub fn optimize_for_stress(&self, stress: f64) -> Vec<QueueEntry> {
        if stress.is_nan() || stress < STRESS_SHED_THRESHOLD {
            return Vec::new();
        }
        let floor = if stress >= STRESS_SHED_SEVERE {
            Importance::High
        } else {
            Importance::Medium
        };

        let mut inner = self.inner.lock();
        let budget = (inner.len as f64 * STRESS_SHED_MAX_FRACTION).floor() as usize;
        let mut removed = Vec::new();
        while removed.len() < budget {
            match inner.evict_below(floor) {
                Some(entry) => removed.push(entry),
                None => break,
            }
        }
        inner.stats.evicted_for_stress += removed.len() as u64;
        self.notify_if_drained(&inner);
        removed
    }

    /// Remove non-critical entries that have waited longer than `max_age`.
    pub fn evict_older_than(&self, max_age: Duration) -> Vec<QueueEntry> {
        let mut inner = self.inner.lock();
        let mut removed = Vec::new();
        for level in 0..Importance::Critical.index() {
            while inner.levels[level]
                .front()
                .is_some_and(|entry| entry.waited() > max_age)
            {
                if let Some(entry) = inner.levels[level].pop_front() {
                    removed.push(entry);
                }
            }
        }
        inner.len -= removed.len();
        inner.outstanding -= removed.len();
        inner.stats.evicted_for_age += removed.len() as u64;
        self.notify_if_drained(&inner);
        removed
    }

    /// Drop everything queued. Returns how many entries were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner.len;
        for level in inner.levels.iter_mut() {
            level.clear();
        }
        inner.len = 0;
        inner.outstanding -= removed;
        self.notify_if_drained(&inner);
        removed
    }

    /// Consumers report finished entries so `wait_drained` can return.
    pub fn complete(&self, count: usize) {
        let mut inner = self.inner.lock();
        inner.outstanding = inner.outstanding.saturating_sub(count);
        self.notify_if_drained(&inner);
    }

    /// Entries enqueued but not yet completed, including ones a consumer holds.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().outstanding
    }

    /// Block until every enqueued entry has been completed or evicted.
    pub fn wait_drained(&self, timeout: Duration) -> QueueResult<()> {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.inner.lock();
        while inner.outstanding > 0 {
            let Some(deadline) = deadline else {
                self.drained.wait(&mut inner);
                continue;
            };
            if self.drained.wait_until(&mut inner, deadline).timed_out() {
                if inner.outstanding == 0 {
                    break;
                }
                return Err(QueueError::DrainTimeout {
                    outstanding: inner.outstanding,
                });
            }
        }
        Ok(())
    }

    /// Reject new entries and wake every waiting consumer.
    pub fn shutdown(&self) {
        self.inner.lock().shut_down = true;
        self.not_empty.notify_all();
        self.drained.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }

    pub fn size(&self) -> usize {
        self.inner.lock().len
    }

    /// Entry counts indexed by `Importance::index()`.
    pub fn size_by_level(&self) -> [usize; Importance::COUNT] {
        let inner = self.inner.lock();
        let mut sizes = [0; Importance::COUNT];
        for (size, level) in sizes.iter_mut().zip(inner.levels.iter()) {
            *size = level.len();
        }
        sizes
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity
    }

    /// Occupancy in 0..=1; a zero-capacity queue reports full.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        self.size() as f64 / self.capacity as f64
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }

    fn notify_if_drained(&self, inner: &Inner) {
        if inner.outstanding == 0 {
            self.drained.notify_all();
        }
    }
}

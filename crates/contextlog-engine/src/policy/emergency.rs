// Emergency mode state
//
// Lock-free so producers can check it on every decision. The expiry is kept
// as nanoseconds since a fixed base instant; zero means disarmed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct EmergencyState {
    base: Instant,
    until_ns: AtomicU64,
    activations: AtomicU64,
}

impl Default for EmergencyState {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyState {
    pub fn new() -> Self {
        EmergencyState {
            base: Instant::now(),
            until_ns: AtomicU64::new(0),
            activations: AtomicU64::new(0),
        }
    }

    fn now_ns(&self) -> u64 {
        // +1 keeps a live expiry distinct from the disarmed marker
        self.base.elapsed().as_nanos().min(u64::MAX as u128 - 1) as u64 + 1
    }

    /// Arm for `duration`; re-entry extends the expiry, never shortens it.
    /// Returns true if emergency mode was not active before. A zero duration
    /// changes nothing.
    pub fn enter(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return false;
        }
        let now = self.now_ns();
        let until = now.saturating_add(duration.as_nanos().min(u64::MAX as u128) as u64);
        let previous = self.until_ns.fetch_max(until, Ordering::AcqRel);
        let newly_active = previous <= now;
        if newly_active {
            self.activations.fetch_add(1, Ordering::Relaxed);
        }
        newly_active
    }

    /// Disarm. Returns true if it was armed.
    pub fn exit(&self) -> bool {
        self.until_ns.swap(0, Ordering::AcqRel) != 0
    }

    pub fn is_active(&self) -> bool {
        self.until_ns.load(Ordering::Acquire) > self.now_ns()
    }

    /// Armed but past its expiry; waiting for evaluation to clear it.
    pub fn is_expired(&self) -> bool {
        let until = self.until_ns.load(Ordering::Acquire);
        until != 0 && until <= self.now_ns()
    }

    pub fn remaining(&self) -> Option<Duration> {
        let until = self.until_ns.load(Ordering::Acquire);
        let now = self.now_ns();
        (until > now).then(|| Duration::from_nanos(until - now))
    }

    /// Push the expiry out by `extra`. Returns false if not active.
    pub fn extend(&self, extra: Duration) -> bool {
        let extra = extra.as_nanos().min(u64::MAX as u128) as u64;
        let now = self.now_ns();
        self.until_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |until| {
                (until > now).then(|| until.saturating_add(extra))
            })
            .is_ok()
    }

    /// Times emergency mode went from inactive to active.
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }
}

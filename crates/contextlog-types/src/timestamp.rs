// Timestamps for log messages
//
// Wall-clock seconds + microseconds paired with a process-wide monotonic tick.
// Two timestamps taken in the same process compare by tick, so ordering never
// depends on the wall clock going forward.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

static TICK: AtomicU64 = AtomicU64::new(1);

/// Message timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    seconds: i64,
    micros: u32,
    tick: u64,
}

impl Timestamp {
    /// Sample the wall clock and take the next monotonic tick
    pub fn now() -> Self {
        let now = Utc::now();
        Timestamp {
            seconds: now.timestamp(),
            micros: now.timestamp_subsec_micros(),
            tick: TICK.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Build a timestamp from explicit parts; used when replaying stored records
    pub fn from_parts(seconds: i64, micros: u32, tick: u64) -> Self {
        Timestamp {
            seconds,
            micros: micros.min(999_999),
            tick,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn micros(&self) -> u32 {
        self.micros
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Microseconds since the UNIX epoch
    pub fn as_micros(&self) -> i64 {
        self.seconds * 1_000_000 + self.micros as i64
    }

    /// Convert to a chrono datetime for sinks that format dates
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.seconds, self.micros * 1_000)
            .single()
            .unwrap_or_default()
    }

    /// Whether this timestamp is more than `seconds` older than `now`
    pub fn is_older_than(&self, now: &Timestamp, seconds: u64) -> bool {
        now.as_micros().saturating_sub(self.as_micros()) > (seconds as i64) * 1_000_000
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.tick.cmp(&other.tick)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%dT%H:%M:%S%.6fZ"))
    }
}

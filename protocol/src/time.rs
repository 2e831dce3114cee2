//! # Ledger Time
//!
//! Ledger time is a plain `u64` count of seconds since the Unix epoch. It is
//! supplied to every operation explicitly (as part of the call context), so
//! the accounting code never reads a wall clock on its own.
//!
//! A [`Clock`] is what the service layer consults to stamp incoming calls.
//! [`SystemClock`] reads `chrono::Utc::now()`; [`ManualClock`] is advanced by
//! hand and is what the tests use to walk through lock periods and rate
//! changes.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// One minute in seconds.
pub const MINUTE: Timestamp = 60;
/// One hour in seconds.
pub const HOUR: Timestamp = 60 * MINUTE;
/// One day in seconds.
pub const DAY: Timestamp = 24 * HOUR;

/// Source of "now" for incoming calls.
pub trait Clock: Send + Sync {
    /// Current ledger time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time. Pre-epoch system clocks are clamped to zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp().max(0) as Timestamp
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Moves the clock forward by `secs` and returns the new time.
    pub fn advance(&self, secs: Timestamp) -> Timestamp {
        self.now.fetch_add(secs, Ordering::SeqCst) + secs
    }

    /// Sets the clock to an absolute time. Going backwards is allowed here;
    /// the ledger is what rejects non-monotonic timestamps.
    pub fn set(&self, at: Timestamp) {
        self.now.store(at, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Renders a ledger timestamp as a UTC datetime, for logs and events.
/// Values beyond chrono's range fall back to the epoch.
pub fn to_datetime(ts: Timestamp) -> DateTime<Utc> {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_default()
}

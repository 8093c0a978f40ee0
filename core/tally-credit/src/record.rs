//! The plaintext credit record carried inside a token.
//!
//! A record holds a flat balance, a validity window and the version tag of
//! the build it was minted for. Records minted with a deferred window carry
//! a far-future `start_at`; the window is pinned to real time on first
//! consumption.

use serde::{Deserialize, Serialize};

/// Seconds in one day.
pub const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// `start_at` written into deferred records: 9999-12-31 00:00:00 UTC.
///
/// Any record whose `start_at` lies in the future is treated as unactivated,
/// so the exact value only matters for wire compatibility.
pub const UNACTIVATED_START_AT: i64 = 253_402_214_400;

/// The decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRecord {
    /// Build generation the token was minted for.
    #[serde(default)]
    pub version: String,
    /// Remaining balance.
    pub points: i64,
    /// Start of the validity window (seconds since epoch).
    pub start_at: i64,
    /// End of the validity window (seconds since epoch, inclusive).
    pub end_at: i64,
}

/// Temporal status of a record relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// The window has not started; it will open at first use and last
    /// `duration` seconds.
    Unactivated {
        /// Window length preserved by activation.
        duration: i64,
    },
    /// The window is pinned to wall-clock time.
    Active {
        /// Window start (seconds since epoch).
        start: i64,
        /// Window end (seconds since epoch, inclusive).
        end: i64,
    },
}

/// A concrete validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Window start (seconds since epoch).
    pub start_at: i64,
    /// Window end (seconds since epoch, inclusive).
    pub end_at: i64,
}

impl Window {
    /// Returns true if `now` is past the end of the window.
    #[must_use]
    pub fn has_ended(&self, now: i64) -> bool {
        now > self.end_at
    }

    /// Seconds remaining until the window closes (negative once ended).
    #[must_use]
    pub fn expires_in(&self, now: i64) -> i64 {
        self.end_at - now
    }
}

impl CreditRecord {
    /// Creates a record with an explicit window.
    #[must_use]
    pub fn new(version: impl Into<String>, points: i64, start_at: i64, end_at: i64) -> Self {
        Self {
            version: version.into(),
            points,
            start_at,
            end_at,
        }
    }

    /// Creates an unactivated record whose window opens at first use.
    ///
    /// The window end saturates at `i64::MAX`.
    #[must_use]
    pub fn deferred(version: impl Into<String>, points: i64, duration_secs: i64) -> Self {
        Self::new(
            version,
            points,
            UNACTIVATED_START_AT,
            UNACTIVATED_START_AT.saturating_add(duration_secs),
        )
    }

    /// Length of the validity window in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        self.end_at - self.start_at
    }

    /// Classifies the record's window as seen at `now`.
    #[must_use]
    pub fn validity(&self, now: i64) -> Validity {
        if now < self.start_at {
            Validity::Unactivated {
                duration: self.duration_secs(),
            }
        } else {
            Validity::Active {
                start: self.start_at,
                end: self.end_at,
            }
        }
    }

    /// The window that applies if the record were used at `now`.
    ///
    /// An unactivated record previews `[now, now + duration]`; this does
    /// not modify the record.
    #[must_use]
    pub fn effective_window(&self, now: i64) -> Window {
        match self.validity(now) {
            Validity::Unactivated { duration } => Window {
                start_at: now,
                end_at: now + duration,
            },
            Validity::Active { start, end } => Window {
                start_at: start,
                end_at: end,
            },
        }
    }

    /// Returns a copy with the window pinned at `now` and `cost` deducted.
    ///
    /// The receiver is left untouched so a failed re-encode never leaves a
    /// half-applied debit behind.
    #[must_use]
    pub fn debited(&self, cost: i64, now: i64) -> Self {
        let window = self.effective_window(now);
        Self {
            version: self.version.clone(),
            points: self.points - cost,
            start_at: window.start_at,
            end_at: window.end_at,
        }
    }
}

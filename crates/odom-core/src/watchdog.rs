//! [`DeadlineWatchdog`] – publication liveness monitor.
//!
//! Every publication, whether it came from a real encoder sample or was
//! synthesized here, is reported through [`DeadlineWatchdog::record_publish`].
//! The watchdog considers the stream *expired* once the time since the last
//! publication reaches the configured timeout.
//!
//! Expiry is self-resetting: the caller publishes a zero velocity and records
//! it, which re-arms the deadline. A silent sensor therefore produces one
//! zero-velocity publication per timeout interval.

use std::time::{Duration, Instant};

use odom_types::Stamp;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Liveness state of the publication stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineState {
    /// A publication happened less than one timeout ago.
    Quiet,
    /// The last publication is at least one timeout old.
    Expired,
}

// ────────────────────────────────────────────────────────────────────────────
// DeadlineWatchdog
// ────────────────────────────────────────────────────────────────────────────

/// Tracks the most recent publication and detects silence.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use chrono::Utc;
/// use odom_core::watchdog::{DeadlineState, DeadlineWatchdog};
/// use odom_types::Stamp;
///
/// let start = Instant::now();
/// let wd = DeadlineWatchdog::new(Duration::from_millis(100), Stamp::new(Utc::now(), start));
///
/// assert_eq!(wd.state(start + Duration::from_millis(99)), DeadlineState::Quiet);
/// assert_eq!(wd.state(start + Duration::from_millis(100)), DeadlineState::Expired);
/// ```
#[derive(Debug, Clone)]
pub struct DeadlineWatchdog {
    timeout: Duration,
    last_publish: Stamp,
}

impl DeadlineWatchdog {
    /// Create a watchdog armed at `armed_at`.
    ///
    /// The arming instant is treated as the reference publication, so the
    /// first expiry happens one `timeout` later.
    pub fn new(timeout: Duration, armed_at: Stamp) -> Self {
        Self {
            timeout,
            last_publish: armed_at,
        }
    }

    /// Record that a publication happened at `at`, re-arming the deadline.
    pub fn record_publish(&mut self, at: Stamp) {
        self.last_publish = at;
    }

    /// Stamp of the most recent publication (or of arming).
    pub fn last_publish(&self) -> Stamp {
        self.last_publish
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Classify the stream at monotonic instant `now`.
    ///
    /// An instant earlier than the last publication counts as zero elapsed.
    pub fn state(&self, now: Instant) -> DeadlineState {
        if now.saturating_duration_since(self.last_publish.mono) >= self.timeout {
            DeadlineState::Expired
        } else {
            DeadlineState::Quiet
        }
    }

    /// Instant at which the stream expires if nothing is published before.
    ///
    /// Returns `None` when the deadline lies beyond what [`Instant`] can
    /// represent.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_publish.mono.checked_add(self.timeout)
    }
}

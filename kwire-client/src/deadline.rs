//! Call deadlines and the RTT-aware conversion to broker-side timeouts.

use std::time::Duration;
use tokio::time::Instant;

/// Absolute point in time by which a call must complete.
///
/// `Deadline::NONE` means the caller imposes no bound; lower layers then
/// fall back to configured timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub const NONE: Deadline = Deadline(None);

    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Deadline(Some(Instant::now() + timeout))
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn has_elapsed(&self, now: Instant) -> bool {
        matches!(self.0, Some(d) if d <= now)
    }

    /// Returns the earlier of this deadline and `now + timeout`.
    pub fn or_within(&self, now: Instant, timeout: Duration) -> Instant {
        let bound = now + timeout;
        match self.0 {
            Some(d) if d < bound => d,
            _ => bound,
        }
    }
}

impl From<Instant> for Deadline {
    fn from(instant: Instant) -> Self {
        Deadline::at(instant)
    }
}

/// Pulls a deadline in to leave room for the response to travel back.
///
/// Without a deadline the result is `now + rtt`. With a deadline `d`, the
/// reserve is `rtt` when at least that much time is left, otherwise a
/// quarter of what remains.
pub fn adjust_for_rtt(deadline: Deadline, now: Instant, rtt: Duration) -> Instant {
    match deadline.instant() {
        None => now + rtt,
        Some(d) => {
            let remaining = d.saturating_duration_since(now);
            let reserve = if remaining >= rtt { rtt } else { remaining / 4 };
            d - reserve
        }
    }
}

/// Time left until `t`, zero if it has passed.
pub fn deadline_to_timeout(t: Instant, now: Instant) -> Duration {
    t.saturating_duration_since(now)
}

/// Whole milliseconds in `d`, saturating at `i32::MAX`.
pub fn milliseconds(d: Duration) -> i32 {
    d.as_millis().min(i32::MAX as u128) as i32
}

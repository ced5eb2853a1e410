//! Reporting cadence for the poll loop
//!
//! The poll loop never sleeps longer than [`MAX_POLL_WAIT`] so shutdown stays
//! responsive, and never past the next report deadline. Deadlines advance in
//! whole intervals from the previous deadline, not from the time the report
//! was printed, so a slow report does not shift the schedule.

use std::time::{Duration, Instant};

/// Upper bound on a single ring-buffer wait
pub const MAX_POLL_WAIT: Duration = Duration::from_millis(250);
const MIN_POLL_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct ReportClock {
    interval: Duration,
    /// `None` once the deadline lies beyond what `Instant` can represent
    next_deadline: Option<Instant>,
}

impl ReportClock {
    /// First report is due one `interval` after `now`.
    #[must_use]
    pub fn new(now: Instant, interval: Duration) -> Self {
        Self { interval, next_deadline: now.checked_add(interval) }
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// How long the next poll may block.
    ///
    /// Zero once the deadline is due, otherwise the remaining time clamped to
    /// `1ms..=250ms`.
    #[must_use]
    pub fn poll_timeout(&self, now: Instant) -> Duration {
        match self.next_deadline {
            None => MAX_POLL_WAIT,
            Some(deadline) if now >= deadline => Duration::ZERO,
            Some(deadline) => (deadline - now).clamp(MIN_POLL_WAIT, MAX_POLL_WAIT),
        }
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Move the deadline past `now`.
    ///
    /// After a stall several intervals may be skipped; the caller still emits
    /// only one report for them.
    pub fn advance(&mut self, now: Instant) {
        if self.interval.is_zero() {
            self.next_deadline = Some(now);
            return;
        }
        while let Some(deadline) = self.next_deadline {
            self.next_deadline = deadline.checked_add(self.interval);
            if self.next_deadline.is_some_and(|next| next > now) {
                break;
            }
        }
    }
}

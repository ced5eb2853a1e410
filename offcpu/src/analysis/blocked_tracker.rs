//! Blocked-time reporting over the kernel's cumulative histogram.
//!
//! The kernel counters are never reset, so global mode simply renders the
//! lifetime distribution. Single-process mode needs per-interval numbers:
//! the previous snapshot is kept and the per-bucket increase is weighted by
//! the bucket midpoint. Both totals are estimates, since only counts survive
//! bucketing.

use offcpu_common::bucket::bucket_midpoint;

use crate::domain::{FilterMode, Pid};

/// Output of one interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockedReport {
    /// Single-process mode: midpoint-weighted estimates in microseconds
    Process { pid: Pid, interval_us: u64, running_total_us: u64 },
    /// Global mode: the lifetime-cumulative counts as read
    Histogram { counts: Vec<u64> },
}

/// Turns successive snapshots of the kernel counters into reports
#[derive(Debug)]
pub struct BlockedTracker {
    filter: FilterMode,
    previous: Vec<u64>,
}

impl BlockedTracker {
    #[must_use]
    pub fn new(filter: FilterMode) -> Self {
        Self { filter, previous: Vec::new() }
    }

    /// Consume the current snapshot of the kernel counters.
    pub fn observe(&mut self, counts: Vec<u64>) -> BlockedReport {
        let pid = match self.filter {
            FilterMode::Global => return BlockedReport::Histogram { counts },
            FilterMode::Process(pid) => pid,
        };

        if self.previous.len() != counts.len() {
            self.previous = vec![0; counts.len()];
        }

        let mut interval_us = 0u64;
        let mut running_total_us = 0u64;
        for (b, (&current, &previous)) in counts.iter().zip(&self.previous).enumerate() {
            let mid = bucket_midpoint(u32::try_from(b).unwrap_or(u32::MAX));
            running_total_us = running_total_us.saturating_add(mid.saturating_mul(current));
            interval_us =
                interval_us.saturating_add(mid.saturating_mul(current.saturating_sub(previous)));
        }
        self.previous = counts;

        BlockedReport::Process { pid, interval_us, running_total_us }
    }
}

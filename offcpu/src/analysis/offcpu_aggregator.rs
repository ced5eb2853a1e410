//! Per-process off-CPU aggregation for one reporting interval.
//!
//! Samples are grouped by owning process as they are drained from the ring
//! buffer. At the end of each interval [`OffCpuAggregator::drain_and_reset`]
//! turns the collected deltas into a report and discards every entry, so
//! off-CPU reporting is strictly per-interval. Only the filter-mode running
//! total survives across intervals.
//!
//! # Data Flow
//!
//! ```text
//! OffCpuSample ──► TgidResolver ──► record(pid, delta_ns)
//!                                        │
//!                          (interval end)▼
//!                                drain_and_reset() ──► OffCpuReport
//! ```

use std::collections::HashMap;

use offcpu_common::bucket::usecs_bucket;

use crate::domain::{FilterMode, Pid};

/// Off-CPU time collected for one process during the current interval
#[derive(Debug, Default)]
struct ProcessAggregate {
    total_ns: u64,
    /// Raw per-sample deltas, in arrival order
    deltas: Vec<u64>,
}

/// Output of one interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffCpuReport {
    /// Single-process mode: this interval's total and the running total
    Process { pid: Pid, interval_ns: u64, running_total_ns: u64 },
    /// Global mode: log2(usecs) histogram of every sample in the interval
    Histogram { counts: Vec<u64> },
}

/// Accumulates off-CPU samples per process
#[derive(Debug)]
pub struct OffCpuAggregator {
    filter: FilterMode,
    entries: HashMap<Pid, ProcessAggregate>,
    running_total_ns: u64,
    /// Deltas lost to allocation failure (totals still include them)
    dropped_deltas: u64,
}

impl OffCpuAggregator {
    #[must_use]
    pub fn new(filter: FilterMode) -> Self {
        Self { filter, entries: HashMap::new(), running_total_ns: 0, dropped_deltas: 0 }
    }

    /// Add one off-CPU interval for `pid`.
    pub fn record(&mut self, pid: Pid, delta_ns: u64) {
        let entry = self.entries.entry(pid).or_default();
        entry.total_ns = entry.total_ns.saturating_add(delta_ns);
        if entry.deltas.try_reserve(1).is_ok() {
            entry.deltas.push(delta_ns);
        } else {
            self.dropped_deltas += 1;
        }
    }

    /// Number of processes seen this interval
    #[must_use]
    pub fn process_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of samples recorded this interval
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.entries.values().map(|e| e.deltas.len()).sum()
    }

    #[must_use]
    pub fn dropped_deltas(&self) -> u64 {
        self.dropped_deltas
    }

    /// Build this interval's report and clear all per-interval state.
    pub fn drain_and_reset(&mut self) -> OffCpuReport {
        let entries = std::mem::take(&mut self.entries);

        match self.filter {
            FilterMode::Process(pid) => {
                let interval_ns =
                    entries.values().fold(0u64, |acc, e| acc.saturating_add(e.total_ns));
                self.running_total_ns = self.running_total_ns.saturating_add(interval_ns);
                OffCpuReport::Process { pid, interval_ns, running_total_ns: self.running_total_ns }
            }
            FilterMode::Global => OffCpuReport::Histogram { counts: histogram(&entries) },
        }
    }
}

/// Count every delta into its log2(usecs) bucket; sized to the highest bucket seen.
fn histogram(entries: &HashMap<Pid, ProcessAggregate>) -> Vec<u64> {
    let mut counts: Vec<u64> = Vec::new();
    for delta in entries.values().flat_map(|e| e.deltas.iter()) {
        let bucket = usecs_bucket(*delta) as usize;
        if bucket >= counts.len() {
            counts.resize(bucket + 1, 0);
        }
        counts[bucket] += 1;
    }
    counts
}

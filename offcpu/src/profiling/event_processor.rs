//! # Event Processing
//!
//! Consumes `OffCpuSample` records drained from the `OFFCPU_EVENTS` ring
//! buffer: each record is decoded, its thread resolved to a process, and the
//! delta handed to the aggregator when the filter accepts that process.

use log::warn;
use offcpu_common::OffCpuSample;

use crate::analysis::{OffCpuAggregator, OffCpuReport};
use crate::domain::{FilterMode, Tid};
use crate::profiling::tgid_resolver::{OwnerLookup, TgidResolver};

/// Decode one ring-buffer record, or `None` if it is too short.
#[must_use]
pub fn parse_sample(bytes: &[u8]) -> Option<OffCpuSample> {
    if bytes.len() < std::mem::size_of::<OffCpuSample>() {
        return None;
    }
    // SAFETY: length checked above and OffCpuSample is plain old data
    #[allow(unsafe_code)]
    let sample = unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<OffCpuSample>()) };
    Some(sample)
}

/// Encapsulates per-sample processing state
pub struct EventProcessor<L: OwnerLookup> {
    filter: FilterMode,
    resolver: TgidResolver<L>,
    aggregator: OffCpuAggregator,

    /// Records decoded since start
    pub sample_count: u64,
    /// Records skipped because they were truncated
    pub short_records: u64,
    /// Samples rejected by the PID filter
    pub filtered_out: u64,
}

impl<L: OwnerLookup> EventProcessor<L> {
    #[must_use]
    pub fn new(filter: FilterMode, lookup: L) -> Self {
        Self {
            filter,
            resolver: TgidResolver::new(lookup),
            aggregator: OffCpuAggregator::new(filter),
            sample_count: 0,
            short_records: 0,
            filtered_out: 0,
        }
    }

    /// Handle one raw ring-buffer record
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        match parse_sample(bytes) {
            Some(sample) => self.process_sample(&sample),
            None => {
                self.short_records += 1;
                warn!(
                    "Received incomplete off-CPU record ({} of {} bytes)",
                    bytes.len(),
                    std::mem::size_of::<OffCpuSample>()
                );
            }
        }
    }

    /// Attribute one sample to its process and aggregate it
    pub fn process_sample(&mut self, sample: &OffCpuSample) {
        self.sample_count += 1;
        let pid = self.resolver.resolve(Tid(sample.tid), sample.tgid);
        if self.filter.accepts(pid) {
            self.aggregator.record(pid, sample.delta_ns);
        } else {
            self.filtered_out += 1;
        }
    }

    /// Close the current interval
    pub fn finish_interval(&mut self) -> OffCpuReport {
        self.aggregator.drain_and_reset()
    }

    #[must_use]
    pub fn aggregator(&self) -> &OffCpuAggregator {
        &self.aggregator
    }

    #[must_use]
    pub fn resolver(&self) -> &TgidResolver<L> {
        &self.resolver
    }
}

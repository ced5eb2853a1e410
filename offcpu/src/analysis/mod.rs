//! Analysis logic for profiling data
//!
//! Pure per-interval aggregation, separated from eBPF access and output.

pub mod blocked_tracker;
pub mod offcpu_aggregator;

pub use blocked_tracker::{BlockedReport, BlockedTracker};
pub use offcpu_aggregator::{OffCpuAggregator, OffCpuReport};

//! Profiling core modules
//!
//! Everything between the loaded probe and the analysis layer:
//! - eBPF program loading, attachment and map handles
//! - Kernel counter snapshots and drop diagnostics
//! - Ring-buffer record processing
//! - Thread → process resolution
//! - Reporting cadence

pub mod diagnostics;
pub mod ebpf_setup;
pub mod event_processor;
pub mod report_clock;
pub mod tgid_resolver;

// Re-export common types
pub use diagnostics::{CounterSource, DropMonitor};
pub use ebpf_setup::{
    attach_scheduler_hooks, init_ebpf_logger, load_ebpf_program, take_blocked_histogram,
    take_dropped_counter, take_sample_ring, SchedulerHook, SCHEDULER_HOOKS,
};
pub use event_processor::{parse_sample, EventProcessor};
pub use report_clock::{ReportClock, MAX_POLL_WAIT};
pub use tgid_resolver::{OwnerLookup, ProcStatusLookup, TgidResolver};

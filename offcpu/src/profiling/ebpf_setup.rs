//! # eBPF Program Loading and Attachment
//!
//! Loads the compiled probe object and attaches its programs to the
//! scheduler tracepoints.
//!
//! ## Attachment Points
//!
//! - **Tracepoint**: `sched/sched_switch` (off-CPU intervals, blocked start)
//! - **Tracepoint**: `sched/sched_wakeup` (blocked end)
//! - **Tracepoint**: `sched/sched_wakeup_new` (blocked end, new threads)
//!
//! Everything attached here is detached when the returned [`Ebpf`] is dropped.

use std::path::Path;

use aya::{
    maps::{Array, MapData, RingBuf},
    programs::TracePoint,
    Ebpf,
};
use aya_log::EbpfLogger;
use log::{info, warn};
use offcpu_common::{
    BLOCKED_HIST_MAP, DROPPED_SAMPLES_MAP, OFFCPU_EVENTS_MAP, PROG_SCHED_SWITCH,
    PROG_SCHED_WAKEUP, PROG_SCHED_WAKEUP_NEW,
};

use crate::domain::ProfilerError;

/// A program and the tracepoint it attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerHook {
    pub program: &'static str,
    pub category: &'static str,
    pub name: &'static str,
}

/// Scheduler tracepoints, in attach order
pub const SCHEDULER_HOOKS: [SchedulerHook; 3] = [
    SchedulerHook { program: PROG_SCHED_SWITCH, category: "sched", name: "sched_switch" },
    SchedulerHook { program: PROG_SCHED_WAKEUP, category: "sched", name: "sched_wakeup" },
    SchedulerHook { program: PROG_SCHED_WAKEUP_NEW, category: "sched", name: "sched_wakeup_new" },
];

/// Load the eBPF object from disk
///
/// # Errors
/// Returns an error if the file cannot be read or the kernel rejects the object
pub fn load_ebpf_program(path: &Path) -> Result<Ebpf, ProfilerError> {
    let bpf = Ebpf::load_file(path).map_err(|source| ProfilerError::EbpfLoadFailed {
        path: path.display().to_string(),
        source,
    })?;
    info!("✓ Loaded eBPF object {}", path.display());
    Ok(bpf)
}

/// Initialize eBPF logger
pub fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        // Release builds of the probe may contain no log statements at all
        warn!("Failed to initialize eBPF logger: {e}");
    }
}

/// Load and attach all scheduler tracepoint programs
///
/// # Errors
/// Returns an error if a program is missing, fails verification or cannot be attached
pub fn attach_scheduler_hooks(bpf: &mut Ebpf) -> Result<(), ProfilerError> {
    for hook in SCHEDULER_HOOKS {
        let program: &mut TracePoint = bpf
            .program_mut(hook.program)
            .ok_or(ProfilerError::ProgramNotFound(hook.program))?
            .try_into()?;
        program.load()?;
        program.attach(hook.category, hook.name).map_err(|source| {
            ProfilerError::ProbeAttachFailed {
                program: hook.program,
                category: hook.category,
                name: hook.name,
                source,
            }
        })?;
        info!("✓ Attached tracepoint: {}:{}", hook.category, hook.name);
    }
    Ok(())
}

/// Take ownership of the off-CPU sample ring buffer
///
/// # Errors
/// Returns an error if the map is missing or is not a ring buffer
pub fn take_sample_ring(bpf: &mut Ebpf) -> Result<RingBuf<MapData>, ProfilerError> {
    let map =
        bpf.take_map(OFFCPU_EVENTS_MAP).ok_or(ProfilerError::MapNotFound(OFFCPU_EVENTS_MAP))?;
    Ok(RingBuf::try_from(map)?)
}

/// Take ownership of the blocked-time histogram counters
///
/// # Errors
/// Returns an error if the map is missing or is not a `u64` array
pub fn take_blocked_histogram(bpf: &mut Ebpf) -> Result<Array<MapData, u64>, ProfilerError> {
    let map =
        bpf.take_map(BLOCKED_HIST_MAP).ok_or(ProfilerError::MapNotFound(BLOCKED_HIST_MAP))?;
    Ok(Array::try_from(map)?)
}

/// Take ownership of the dropped-sample counter
///
/// # Errors
/// Returns an error if the map is missing or is not a `u64` array
pub fn take_dropped_counter(bpf: &mut Ebpf) -> Result<Array<MapData, u64>, ProfilerError> {
    let map = bpf
        .take_map(DROPPED_SAMPLES_MAP)
        .ok_or(ProfilerError::MapNotFound(DROPPED_SAMPLES_MAP))?;
    Ok(Array::try_from(map)?)
}

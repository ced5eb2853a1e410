//! # Shared Data Structures (eBPF ↔ Userspace)
//!
//! Defines the records, map names and scheduler state machine shared between
//! the kernel-side eBPF programs and the userspace consumer. Wire types use
//! `#[repr(C)]` for a consistent layout across the kernel/userspace boundary.
//!
//! ## Key Types
//!
//! - [`OffCpuSample`] - Completed off-CPU interval passed via ring buffer
//! - [`SchedSwitchArgs`] - Tracepoint arguments from `sched_switch`
//! - [`SchedWakeupArgs`] - Tracepoint arguments from `sched_wakeup{,_new}`
//! - [`capture`] - Switch/wakeup handlers generic over the map backends
//! - [`bucket`] - Log2 bucketing shared by both histograms

#![cfg_attr(not(test), no_std)]

pub mod bucket;
pub mod capture;

// ============================================================================
// Map Names and Sizes
// ============================================================================

/// Ring buffer carrying [`OffCpuSample`] records (16 MiB)
pub const OFFCPU_EVENTS_MAP: &str = "OFFCPU_EVENTS";

/// Array of [`BLOCKED_HIST_BUCKETS`] lifetime-cumulative counters
pub const BLOCKED_HIST_MAP: &str = "BLOCKED_HIST";

/// Single-slot counter of samples lost to a full ring buffer
pub const DROPPED_SAMPLES_MAP: &str = "DROPPED_SAMPLES";

/// Ring buffer byte size. Must be a power of two multiple of the page size.
pub const OFFCPU_RING_BYTES: u32 = 1 << 24;

/// Maximum threads tracked at once in each per-thread timestamp table
pub const MAX_TRACKED_THREADS: u32 = 16384;

/// Number of log2 buckets in the kernel blocked-time histogram
pub const BLOCKED_HIST_BUCKETS: u32 = 64;

// ============================================================================
// Program Names
// ============================================================================

/// Tracepoint program for `sched/sched_switch`
pub const PROG_SCHED_SWITCH: &str = "handle_sched_switch";

/// Tracepoint program for `sched/sched_wakeup`
pub const PROG_SCHED_WAKEUP: &str = "handle_sched_wakeup";

/// Tracepoint program for `sched/sched_wakeup_new`
pub const PROG_SCHED_WAKEUP_NEW: &str = "handle_sched_wakeup_new";

// ============================================================================
// Shared Data Structures
// ============================================================================

/// One completed off-CPU interval, sent from eBPF to userspace via ring buffer
///
/// Emitted by the `sched_switch` handler when a thread that was previously
/// switched out is switched back in.
///
/// **Memory Layout**: `#[repr(C)]`, 32 bytes, no padding
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OffCpuSample {
    /// Thread ID (kernel `pid`) that was off the CPU
    pub tid: u32,

    /// Owning process (TGID) hint
    ///
    /// Always 0 at emission; userspace resolves the owner from `/proc`.
    /// A non-zero value is trusted as-is by the resolver.
    pub tgid: u32,

    /// Timestamp when the thread was switched out (`bpf_ktime_get_ns`)
    pub t0_ns: u64,

    /// Timestamp when the thread was switched back in
    pub t2_ns: u64,

    /// `t2_ns - t0_ns`
    pub delta_ns: u64,
}

/// Tracepoint arguments for `sched/sched_switch`
///
/// Layout defined by the Linux kernel tracepoint ABI:
/// `/sys/kernel/debug/tracing/events/sched/sched_switch/format`
///
/// - **prev_***: The thread being switched OUT (going off-CPU)
/// - **next_***: The thread being switched IN (going on-CPU)
#[repr(C)]
pub struct SchedSwitchArgs {
    /// Common tracepoint header
    #[allow(clippy::pub_underscore_fields)]
    pub __unused__: u64,

    pub prev_comm: [u8; 16],
    pub prev_pid: i32,
    pub prev_prio: i32,

    /// State of the thread being switched out
    ///
    /// - `0` (`TASK_RUNNING`): preempted, still runnable
    /// - non-zero: going to sleep (interruptible, uninterruptible, ...)
    pub prev_state: i64,

    pub next_comm: [u8; 16],
    pub next_pid: i32,
    pub next_prio: i32,
}

/// Tracepoint arguments for `sched/sched_wakeup` and `sched/sched_wakeup_new`
///
/// Both tracepoints share the `sched_wakeup_template` layout.
#[repr(C)]
pub struct SchedWakeupArgs {
    /// Common tracepoint header
    #[allow(clippy::pub_underscore_fields)]
    pub __unused__: u64,

    pub comm: [u8; 16],

    /// Thread ID being woken
    pub pid: i32,
    pub prio: i32,
    pub success: i32,
    pub target_cpu: i32,
}

#[cfg(feature = "user")]
use aya::Pod;

// Required for reading records and counters as plain bytes in userspace
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for OffCpuSample {}

//! # eBPF Kernel-Side Instrumentation
//!
//! eBPF programs that run inside the Linux kernel to capture scheduler events.
//!
//! ## Programs
//!
//! - **Tracepoint**: `handle_sched_switch` - closes/opens off-CPU intervals
//! - **Tracepoint**: `handle_sched_wakeup` - closes blocked intervals
//! - **Tracepoint**: `handle_sched_wakeup_new` - same, for first wake of a new thread
//!
//! ## Maps (Shared with Userspace)
//!
//! - `OFFCPU_EVENTS` - Ring buffer (16MB) of completed off-CPU intervals
//! - `BLOCKED_HIST` - 64 log2 buckets of blocked time, never reset
//! - `DROPPED_SAMPLES` - Samples lost to a full ring buffer
//!
//! ## Build
//!
//! Always compiled in release mode:
//! ```bash
//! cargo xtask build-ebpf --release
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use core::mem::offset_of;
use core::sync::atomic::{AtomicU64, Ordering};

use aya_ebpf::{
    helpers::bpf_ktime_get_ns,
    macros::{map, tracepoint},
    maps::{Array, HashMap, RingBuf},
    programs::TracePointContext,
};
use aya_log_ebpf::debug;
use offcpu_common::{
    capture::{
        on_switch, on_wakeup, BucketCounters, SampleDisposition, SampleSink, SwitchEvent,
        ThreadTimers,
    },
    OffCpuSample, SchedSwitchArgs, SchedWakeupArgs, BLOCKED_HIST_BUCKETS, MAX_TRACKED_THREADS,
    OFFCPU_RING_BYTES,
};

// ============================================================================
// eBPF Maps - Shared data structures between kernel and userspace
// ============================================================================

/// Ring buffer for completed off-CPU intervals
///
/// - **Size**: 16MB
/// - **Producer**: `handle_sched_switch` only
/// - **Overflow**: reservation fails and the sample is dropped (counted)
#[map]
static OFFCPU_EVENTS: RingBuf = RingBuf::with_byte_size(OFFCPU_RING_BYTES, 0);

/// Map: Thread ID (TID) → timestamp of last switch-out
///
/// Present only while the thread is off-CPU; consumed on switch-in.
#[map]
static OFFCPU_START: HashMap<u32, u64> = HashMap::with_max_entries(MAX_TRACKED_THREADS, 0);

/// Map: Thread ID (TID) → timestamp when the thread went to sleep
///
/// Only written when `prev_state != 0`; consumed on wakeup.
#[map]
static BLOCKED_START: HashMap<u32, u64> = HashMap::with_max_entries(MAX_TRACKED_THREADS, 0);

/// Blocked-time histogram, index = log2(usecs) clamped to 63
#[map]
static BLOCKED_HIST: Array<u64> = Array::with_max_entries(BLOCKED_HIST_BUCKETS, 0);

/// Slot 0: number of samples dropped because the ring buffer was full
#[map]
static DROPPED_SAMPLES: Array<u64> = Array::with_max_entries(1, 0);

// ============================================================================
// Map adapters for the shared state machine
// ============================================================================

struct MapTimers(&'static HashMap<u32, u64>);

impl ThreadTimers for MapTimers {
    #[inline(always)]
    fn start(&self, tid: u32, now_ns: u64) -> bool {
        self.0.insert(&tid, &now_ns, 0).is_ok()
    }

    #[inline(always)]
    fn take(&self, tid: u32) -> Option<u64> {
        let t0 = unsafe { self.0.get(&tid).copied() }?;
        let _ = self.0.remove(&tid);
        Some(t0)
    }
}

struct RingSink;

impl SampleSink for RingSink {
    #[inline(always)]
    fn submit(&self, sample: &OffCpuSample) -> bool {
        match OFFCPU_EVENTS.reserve::<OffCpuSample>(0) {
            Some(mut entry) => {
                entry.write(*sample);
                entry.submit(0);
                true
            }
            None => false,
        }
    }
}

struct AtomicCounters(&'static Array<u64>);

impl BucketCounters for AtomicCounters {
    #[inline(always)]
    fn increment(&self, bucket: u32) {
        if let Some(ptr) = self.0.get_ptr_mut(bucket) {
            // Several CPUs may wake threads concurrently
            unsafe { AtomicU64::from_ptr(ptr) }.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// eBPF Program Hooks
// ============================================================================

/// Hook: `sched/sched_switch`
#[tracepoint]
pub fn handle_sched_switch(ctx: TracePointContext) -> u32 {
    match try_sched_switch(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sched_switch(ctx: &TracePointContext) -> Result<(), i64> {
    // Layout from /sys/kernel/debug/tracing/events/sched/sched_switch/format
    let prev_pid: i32 = unsafe { ctx.read_at(offset_of!(SchedSwitchArgs, prev_pid))? };
    let prev_state: i64 = unsafe { ctx.read_at(offset_of!(SchedSwitchArgs, prev_state))? };
    let next_pid: i32 = unsafe { ctx.read_at(offset_of!(SchedSwitchArgs, next_pid))? };

    let event = SwitchEvent {
        prev_tid: prev_pid as u32,
        prev_state,
        next_tid: next_pid as u32,
        now_ns: unsafe { bpf_ktime_get_ns() },
    };

    let outcome =
        on_switch(&MapTimers(&OFFCPU_START), &MapTimers(&BLOCKED_START), &RingSink, &event);

    if outcome.sample == SampleDisposition::Dropped {
        AtomicCounters(&DROPPED_SAMPLES).increment(0);
    }
    if !outcome.tracked {
        debug!(ctx, "thread table full, tid {} not tracked", event.prev_tid);
    }

    Ok(())
}

/// Hook: `sched/sched_wakeup`
#[tracepoint]
pub fn handle_sched_wakeup(ctx: TracePointContext) -> u32 {
    match try_sched_wakeup(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Hook: `sched/sched_wakeup_new`
///
/// First wakeup of a newly created thread; handled exactly like a wakeup.
#[tracepoint]
pub fn handle_sched_wakeup_new(ctx: TracePointContext) -> u32 {
    match try_sched_wakeup(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sched_wakeup(ctx: &TracePointContext) -> Result<(), i64> {
    let pid: i32 = unsafe { ctx.read_at(offset_of!(SchedWakeupArgs, pid))? };
    let now = unsafe { bpf_ktime_get_ns() };

    on_wakeup(&MapTimers(&BLOCKED_START), &AtomicCounters(&BLOCKED_HIST), pid as u32, now);

    Ok(())
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}

//! # offcpu - eBPF Off-CPU and Blocked-Time Profiler
//!
//! Measures how long threads spend off the CPU and how long they stay blocked
//! before being woken, using three scheduler tracepoints.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     eBPF Programs (Kernel)                      │
//! │  • sched_switch:      close off-CPU interval of next,           │
//! │                       open off-CPU (and blocked) for prev       │
//! │  • sched_wakeup{,_new}: close blocked interval, bump histogram  │
//! └───────────┬───────────────────────────────────┬─────────────────┘
//!             │ OFFCPU_EVENTS ring buffer         │ BLOCKED_HIST array
//!             ▼                                   ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      offcpu (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Event     │──▶│   OffCpu     │──▶│              │         │
//! │  │  Processor   │   │  Aggregator  │   │   Reporter   │──▶stdout│
//! │  └──────────────┘   └──────────────┘   │ (histograms) │         │
//! │         │           ┌──────────────┐   │              │         │
//! │         ▼           │   Blocked    │──▶│              │         │
//! │  ┌──────────────┐   │   Tracker    │   └──────────────┘         │
//! │  │ TgidResolver │   └──────────────┘                            │
//! │  └──────────────┘                                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`profiling`]: probe loading and attachment, ring-buffer record
//!   processing, `/proc` owner lookup and the reporting clock
//! - [`analysis`]: per-interval off-CPU aggregation and blocked histogram
//!   differencing
//! - [`report`]: the shared log2 histogram renderer and per-interval output
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: core types (`Pid`, `Tid`, `FilterMode`) and errors
//! - [`preflight`]: privilege and kernel checks run before loading
//!
//! ## Reporting Modes
//!
//! 1. **Global** (`offcpu <interval>`): both histograms every interval. The
//!    off-CPU histogram covers only the last interval, the blocked histogram
//!    is cumulative since start.
//! 2. **Single process** (`offcpu <interval> <pid>`): one line each for
//!    off-CPU and blocked time, this interval and running total.
//!
//! ## Typical Usage
//!
//! ```bash
//! cargo xtask build-ebpf --release
//! sudo ./target/release/offcpu 1
//! sudo ./target/release/offcpu 5 1234
//! ```

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod preflight;
pub mod profiling;
pub mod report;

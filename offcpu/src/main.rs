//! # offcpu - Main Entry Point
//!
//! `offcpu <interval_seconds> [pid]`: attach the scheduler probes, then drain
//! the off-CPU ring buffer and print a report every interval until Ctrl-C.

use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use tokio::io::unix::AsyncFd;

use offcpu::analysis::BlockedTracker;
use offcpu::cli::Args;
use offcpu::domain::ProfilerError;
use offcpu::preflight::run_preflight_checks;
use offcpu::profiling::{
    attach_scheduler_hooks, init_ebpf_logger, load_ebpf_program, take_blocked_histogram,
    take_dropped_counter, take_sample_ring, CounterSource, DropMonitor, EventProcessor,
    OwnerLookup, ProcStatusLookup, ReportClock,
};
use offcpu::report::Reporter;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    // Usage errors exit with status 2 from inside clap
    let args = Args::parse();
    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let denied = err.chain().any(|cause| {
        matches!(cause.downcast_ref::<ProfilerError>(), Some(ProfilerError::PermissionDenied(_)))
    });
    let msg = format!("{err:#}").to_lowercase();
    if denied || msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

/// Print one interval's reports and reset per-interval state
fn report_interval<W: Write, L: OwnerLookup, C: CounterSource>(
    reporter: &mut Reporter<W>,
    processor: &mut EventProcessor<L>,
    tracker: &mut BlockedTracker,
    blocked_hist: &C,
) -> io::Result<()> {
    let offcpu = processor.finish_interval();
    let blocked = tracker.observe(blocked_hist.snapshot());
    reporter.print_interval(&offcpu, &blocked)
}

#[tokio::main(flavor = "current_thread")]
async fn run(args: &Args) -> Result<()> {
    let config = args.config();

    run_preflight_checks(&args.ebpf_object)?;

    // Programs stay attached for as long as `bpf` is alive
    let mut bpf = load_ebpf_program(&args.ebpf_object)?;
    init_ebpf_logger(&mut bpf);
    attach_scheduler_hooks(&mut bpf)?;

    let mut ring = AsyncFd::new(take_sample_ring(&mut bpf)?)
        .context("Failed to register ring buffer with the runtime")?;
    let blocked_hist = take_blocked_histogram(&mut bpf)?;
    let mut drops = DropMonitor::new(take_dropped_counter(&mut bpf)?);

    let mut processor = EventProcessor::new(config.filter, ProcStatusLookup::default());
    let mut tracker = BlockedTracker::new(config.filter);
    let mut reporter = Reporter::new(io::stdout().lock());

    info!(
        "Tracing off-CPU and blocked time every {}s ({:?}). Hit Ctrl-C to end.",
        config.interval.as_secs(),
        config.filter
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let profiling_start = Instant::now();
    let mut clock = ReportClock::new(profiling_start, config.interval);
    let mut exit_reason = "interrupted";
    let mut poll_error = None;

    loop {
        let wait = clock.poll_timeout(Instant::now());

        tokio::select! {
            polled = tokio::time::timeout(wait, ring.readable_mut()) => {
                match polled {
                    // Timed out with nothing to read
                    Err(_) => {}
                    Ok(Ok(mut guard)) => {
                        let ring_buf = guard.get_inner_mut();
                        while let Some(item) = ring_buf.next() {
                            processor.process_bytes(&item);
                        }
                        guard.clear_ready();
                    }
                    Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                    Ok(Err(e)) => {
                        exit_reason = "ring buffer error";
                        poll_error = Some(ProfilerError::RingBufferPoll(e));
                        break;
                    }
                }
            }
            _ = &mut ctrl_c => {
                break;
            }
        }

        let now = Instant::now();
        if clock.is_due(now) {
            report_interval(&mut reporter, &mut processor, &mut tracker, &blocked_hist)
                .context("Failed to write report")?;
            drops.check_interval();
            debug!(
                "resolver: {} cached threads, {} hits, {} misses; {} deltas lost to allocation failure",
                processor.resolver().cache_len(),
                processor.resolver().hits(),
                processor.resolver().misses(),
                processor.aggregator().dropped_deltas()
            );
            clock.advance(now);
        }
    }

    eprintln!(
        "\n{}: {:.1}s, {} samples ({} filtered out, {} truncated), {} dropped in kernel",
        exit_reason,
        profiling_start.elapsed().as_secs_f64(),
        processor.sample_count,
        processor.filtered_out,
        processor.short_records,
        drops.total(),
    );

    match poll_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

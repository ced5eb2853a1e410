//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{FilterMode, ProfilerConfig};

/// Longest accepted reporting interval
pub const MAX_INTERVAL_SECS: u64 = 0xFFFF_FFFF;

#[derive(Parser, Debug)]
#[command(
    name = "offcpu",
    about = "Off-CPU and blocked-time histograms from scheduler tracepoints",
    after_help = "\
EXAMPLES:
    sudo offcpu 1                Histograms for all processes every second
    sudo offcpu 5 1234           Off-CPU and blocked totals for PID 1234 every 5s"
)]
pub struct Args {
    /// Reporting interval in seconds
    #[arg(
        value_name = "INTERVAL_SEC",
        value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_SECS)
    )]
    pub interval: u64,

    /// Only report on this process
    #[arg(value_name = "PID", value_parser = clap::value_parser!(u32).range(1..))]
    pub pid: Option<u32>,

    /// Compiled eBPF object to load
    #[arg(
        long,
        value_name = "PATH",
        env = "OFFCPU_EBPF_OBJECT",
        default_value = "target/bpfel-unknown-none/release/offcpu"
    )]
    pub ebpf_object: PathBuf,
}

impl Args {
    /// Runtime configuration derived from the arguments
    #[must_use]
    pub fn config(&self) -> ProfilerConfig {
        ProfilerConfig {
            interval: Duration::from_secs(self.interval),
            filter: FilterMode::from(self.pid),
        }
    }
}

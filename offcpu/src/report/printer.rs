//! Per-interval stdout report
//!
//! Global mode prints both histogram sections; single-process mode prints one
//! summary line per report with millisecond values to three decimals.

#![allow(clippy::cast_precision_loss)]

use std::io::{self, Write};

use crate::analysis::{BlockedReport, OffCpuReport};
use crate::report::histogram::{render_histogram, HistogramStyle};

pub const OFFCPU_TITLE: &str = "Off-cpu time histogram";
pub const BLOCKED_TITLE: &str = "Blocked time histogram";

/// Writes interval reports to an output stream
pub struct Reporter<W: Write> {
    out: W,
    style: HistogramStyle,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, style: HistogramStyle::default() }
    }

    #[must_use]
    pub fn with_style(mut self, style: HistogramStyle) -> Self {
        self.style = style;
        self
    }

    /// # Errors
    /// Returns any error from the underlying writer
    pub fn print_offcpu(&mut self, report: &OffCpuReport) -> io::Result<()> {
        match report {
            OffCpuReport::Process { pid, interval_ns, running_total_ns } => writeln!(
                self.out,
                "PID {pid} off-cpu this interval: {:.3} ms (ns={interval_ns}); running total: {:.3} ms (ns={running_total_ns})",
                *interval_ns as f64 / 1e6,
                *running_total_ns as f64 / 1e6,
            ),
            OffCpuReport::Histogram { counts } => {
                render_histogram(&mut self.out, OFFCPU_TITLE, counts, &self.style)
            }
        }
    }

    /// # Errors
    /// Returns any error from the underlying writer
    pub fn print_blocked(&mut self, report: &BlockedReport) -> io::Result<()> {
        match report {
            BlockedReport::Process { pid, interval_us, running_total_us } => writeln!(
                self.out,
                "PID {pid} blocked this interval: {:.3} ms (us={interval_us}); running total: {:.3} ms (us={running_total_us})",
                *interval_us as f64 / 1e3,
                *running_total_us as f64 / 1e3,
            ),
            BlockedReport::Histogram { counts } => {
                render_histogram(&mut self.out, BLOCKED_TITLE, counts, &self.style)
            }
        }
    }

    /// Print both reports for one interval and flush.
    ///
    /// # Errors
    /// Returns any error from the underlying writer
    pub fn print_interval(
        &mut self,
        offcpu: &OffCpuReport,
        blocked: &BlockedReport,
    ) -> io::Result<()> {
        self.print_offcpu(offcpu)?;
        self.print_blocked(blocked)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

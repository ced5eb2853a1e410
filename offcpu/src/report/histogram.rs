//! ASCII log2 histogram renderer shared by the off-CPU and blocked reports.
//!
//! ```text
//! Off-cpu time histogram
//!      usecs               : count    distribution
//!           0 -> 1          : 4        |****                                    |
//!        2048 -> 4095       : 40       |****************************************|
//!     4194303 -> infinity   : 1        |*                                       |
//! ```
//!
//! Buckets past `cap_bucket` are folded into one synthetic "infinity" row.

#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Write};

use offcpu_common::bucket::{bucket_lower, bucket_upper};

/// Display parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramStyle {
    /// Last bucket printed individually
    pub cap_bucket: usize,
    /// Width of a full bar in characters
    pub bar_width: usize,
}

impl Default for HistogramStyle {
    fn default() -> Self {
        Self { cap_bucket: 21, bar_width: 40 }
    }
}

/// One printed line of the histogram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramRow {
    pub lower: u64,
    /// `None` for the infinity row
    pub upper: Option<u64>,
    pub count: u64,
    pub stars: usize,
}

/// Compute the rows to print for `counts` (index = log2 bucket).
///
/// An empty slice renders as a single empty bucket-0 row.
#[must_use]
pub fn histogram_rows(counts: &[u64], style: &HistogramStyle) -> Vec<HistogramRow> {
    let last_nonzero = counts.iter().rposition(|&c| c != 0).unwrap_or(0);
    let end_bucket = last_nonzero.min(style.cap_bucket);
    let infinity_count: u64 = if last_nonzero > style.cap_bucket {
        counts[style.cap_bucket + 1..].iter().sum()
    } else {
        0
    };

    let count_at = |b: usize| counts.get(b).copied().unwrap_or(0);
    let max_count = (0..=end_bucket).map(count_at).max().unwrap_or(0).max(infinity_count);

    let mut rows: Vec<HistogramRow> = (0..=end_bucket)
        .map(|b| HistogramRow {
            lower: bucket_lower(b as u32),
            upper: Some(bucket_upper(b as u32)),
            count: count_at(b),
            stars: scale(count_at(b), max_count, style.bar_width),
        })
        .collect();

    if infinity_count > 0 {
        rows.push(HistogramRow {
            lower: bucket_upper(style.cap_bucket as u32),
            upper: None,
            count: infinity_count,
            stars: scale(infinity_count, max_count, style.bar_width),
        });
    }

    rows
}

/// `round(count / max * width)` clamped to `[0, width]`
fn scale(count: u64, max: u64, width: usize) -> usize {
    if max == 0 {
        return 0;
    }
    let width_wide = width as u128;
    let stars = (u128::from(count) * width_wide * 2 + u128::from(max)) / (2 * u128::from(max));
    usize::try_from(stars.min(width_wide)).unwrap_or(width)
}

/// Write `title`, the column header and one line per row.
///
/// # Errors
/// Returns any error from the underlying writer
pub fn render_histogram<W: Write>(
    out: &mut W,
    title: &str,
    counts: &[u64],
    style: &HistogramStyle,
) -> io::Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "     usecs               : count    distribution")?;
    for row in histogram_rows(counts, style) {
        let bar = format!("{:<width$}", "*".repeat(row.stars), width = style.bar_width);
        match row.upper {
            Some(upper) => {
                writeln!(out, " {:>10} -> {:<10} : {:<8} |{bar}|", row.lower, upper, row.count)?;
            }
            None => {
                writeln!(out, " {:>10} -> {:<10} : {:<8} |{bar}|", row.lower, "infinity", row.count)?;
            }
        }
    }
    Ok(())
}

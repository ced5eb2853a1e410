//! Text output: shared histogram renderer and interval reporter

pub mod histogram;
pub mod printer;

pub use histogram::{histogram_rows, render_histogram, HistogramRow, HistogramStyle};
pub use printer::{Reporter, BLOCKED_TITLE, OFFCPU_TITLE};

//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent passing a thread ID where a process ID is
//! expected, which matters here because the kernel calls both of them "pid".

use std::fmt;
use std::time::Duration;

/// Process ID (thread-group ID in kernel terms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl Pid {
    /// The pid used for samples whose owner could not be resolved
    pub const UNRESOLVED: Pid = Pid(0);
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread ID (kernel `pid`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Which processes are reported on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Every process; histograms are printed
    Global,
    /// A single process; one-line summaries are printed
    Process(Pid),
}

impl FilterMode {
    /// Whether a sample owned by `pid` should be aggregated
    #[must_use]
    pub fn accepts(self, pid: Pid) -> bool {
        match self {
            FilterMode::Global => true,
            FilterMode::Process(filter) => filter == pid,
        }
    }
}

impl From<Option<u32>> for FilterMode {
    fn from(pid: Option<u32>) -> Self {
        match pid {
            Some(pid) if pid > 0 => FilterMode::Process(Pid(pid)),
            _ => FilterMode::Global,
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Reporting interval
    pub interval: Duration,
    pub filter: FilterMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_mode_from_cli_pid() {
        assert_eq!(FilterMode::from(None), FilterMode::Global);
        assert_eq!(FilterMode::from(Some(42)), FilterMode::Process(Pid(42)));
    }

    #[test]
    fn test_filter_accepts() {
        assert!(FilterMode::Global.accepts(Pid::UNRESOLVED));
        assert!(FilterMode::Process(Pid(7)).accepts(Pid(7)));
        assert!(!FilterMode::Process(Pid(7)).accepts(Pid(8)));
    }
}

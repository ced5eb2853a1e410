//! Thread → process resolution
//!
//! The kernel side emits samples keyed by thread ID only. This resolver maps
//! each TID to its thread-group ID, caching successful lookups for the life
//! of the profiler. Failed lookups are not cached so a thread that was not
//! yet visible in `/proc` can be resolved on a later sample.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::{Pid, Tid};

/// Source of truth for a thread's owning process
pub trait OwnerLookup {
    /// Return the owning process, or `None` if the thread is gone or unreadable
    fn resolve_owner(&self, tid: Tid) -> Option<Pid>;
}

/// Reads the `Tgid:` line of `<root>/<tid>/status`
#[derive(Debug, Clone)]
pub struct ProcStatusLookup {
    root: PathBuf,
}

impl ProcStatusLookup {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcStatusLookup {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl OwnerLookup for ProcStatusLookup {
    fn resolve_owner(&self, tid: Tid) -> Option<Pid> {
        let status = fs::read_to_string(self.root.join(tid.0.to_string()).join("status")).ok()?;
        parse_tgid(&status)
    }
}

/// Extract a positive `Tgid:` value from `/proc/<tid>/status` content.
fn parse_tgid(status: &str) -> Option<Pid> {
    let line = status.lines().find(|line| line.starts_with("Tgid:"))?;
    let value: i64 = line["Tgid:".len()..].trim().parse().ok()?;
    u32::try_from(value).ok().filter(|v| *v > 0).map(Pid)
}

/// Caching TID → PID resolver
pub struct TgidResolver<L: OwnerLookup> {
    lookup: L,
    cache: HashMap<Tid, Pid>,
    hits: u64,
    misses: u64,
}

impl<L: OwnerLookup> TgidResolver<L> {
    #[must_use]
    pub fn new(lookup: L) -> Self {
        Self { lookup, cache: HashMap::new(), hits: 0, misses: 0 }
    }

    /// Resolve `tid` to its process.
    ///
    /// A non-zero `hint` (carried in the sample) is trusted without lookup.
    /// Returns [`Pid::UNRESOLVED`] when the owner cannot be determined.
    pub fn resolve(&mut self, tid: Tid, hint: u32) -> Pid {
        if hint != 0 {
            return Pid(hint);
        }

        if let Some(pid) = self.cache.get(&tid) {
            self.hits += 1;
            return *pid;
        }

        self.misses += 1;
        match self.lookup.resolve_owner(tid) {
            Some(pid) => {
                self.cache.insert(tid, pid);
                pid
            }
            None => Pid::UNRESOLVED,
        }
    }

    /// Number of cached threads
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

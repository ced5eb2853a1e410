//! Kernel counter access and drop diagnostics
//!
//! Both the blocked-time histogram and the dropped-sample counter are plain
//! `u64` arrays. [`CounterSource`] abstracts reading them so the snapshot and
//! drop accounting can be exercised without a loaded probe.

use std::borrow::Borrow;

use aya::maps::{Array, MapData};
use log::{debug, warn};

/// A fixed-size array of kernel counters
pub trait CounterSource {
    /// Read every slot. An unreadable slot reads as 0.
    fn snapshot(&self) -> Vec<u64>;
}

impl<T: Borrow<MapData>> CounterSource for Array<T, u64> {
    fn snapshot(&self) -> Vec<u64> {
        (0..self.len())
            .map(|index| match self.get(&index, 0) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Failed to read counter slot {index}: {e}");
                    0
                }
            })
            .collect()
    }
}

/// Tracks samples lost to a full ring buffer
pub struct DropMonitor<C: CounterSource> {
    source: C,
    last_total: u64,
}

impl<C: CounterSource> DropMonitor<C> {
    pub fn new(source: C) -> Self {
        Self { source, last_total: 0 }
    }

    /// Current lifetime total
    #[must_use]
    pub fn total(&self) -> u64 {
        self.source.snapshot().iter().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Log and return the drops since the previous call
    pub fn check_interval(&mut self) -> u64 {
        let total = self.total();
        let new_drops = total.saturating_sub(self.last_total);
        self.last_total = total;
        if new_drops > 0 {
            debug!("{new_drops} off-CPU samples dropped this interval ({total} total)");
        }
        new_drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    impl CounterSource for Vec<u64> {
        fn snapshot(&self) -> Vec<u64> {
            self.clone()
        }
    }

    #[derive(Clone)]
    struct SharedCounter(Rc<RefCell<Vec<u64>>>);

    impl CounterSource for SharedCounter {
        fn snapshot(&self) -> Vec<u64> {
            RefCell::borrow(&self.0).clone()
        }
    }

    #[test]
    fn test_vec_source_snapshot() {
        assert_eq!(vec![1, 2, 3].snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_monitor_reports_increments() {
        let counter = SharedCounter(Rc::new(RefCell::new(vec![0])));
        let mut monitor = DropMonitor::new(counter.clone());
        assert_eq!(monitor.check_interval(), 0);

        counter.0.borrow_mut()[0] = 5;
        assert_eq!(monitor.check_interval(), 5);
        assert_eq!(monitor.check_interval(), 0);

        counter.0.borrow_mut()[0] = 12;
        assert_eq!(monitor.check_interval(), 7);
        assert_eq!(monitor.total(), 12);
    }

    #[test]
    fn test_empty_counter_is_zero() {
        let mut monitor = DropMonitor::new(Vec::new());
        assert_eq!(monitor.total(), 0);
        assert_eq!(monitor.check_interval(), 0);
    }
}

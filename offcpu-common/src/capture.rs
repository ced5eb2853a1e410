//! Scheduler event state machine.
//!
//! Per-thread state is the *presence* of a key in one of two timestamp
//! tables: a thread is off-CPU while it has an off-CPU entry and blocked
//! while it has a blocked entry. Entries are inserted on switch-out and
//! consumed (read then deleted) exactly once.
//!
//! The handlers are generic over the storage so the same code runs inside
//! the eBPF programs (backed by BPF maps) and in host-side tests.

use crate::bucket::blocked_bucket;
use crate::OffCpuSample;

/// A bounded `tid -> start_ns` table.
pub trait ThreadTimers {
    /// Record `now_ns` as the start for `tid`, replacing any previous value.
    ///
    /// Returns `false` when the table is full and the entry was not stored.
    fn start(&self, tid: u32, now_ns: u64) -> bool;

    /// Remove and return the start timestamp for `tid`, if any.
    fn take(&self, tid: u32) -> Option<u64>;
}

/// Producer side of the off-CPU channel. Must never block.
pub trait SampleSink {
    /// Returns `false` if the record could not be reserved and was dropped.
    fn submit(&self, sample: &OffCpuSample) -> bool;
}

/// The blocked-time histogram counters.
pub trait BucketCounters {
    /// Atomically add one to `bucket`.
    fn increment(&self, bucket: u32);
}

/// What happened to the interval closed by a switch-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleDisposition {
    /// The incoming thread had no open off-CPU interval
    NoInterval,
    /// A sample was written to the channel
    Submitted,
    /// The channel was full; the sample was lost
    Dropped,
}

/// Result of handling one `sched_switch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchOutcome {
    pub sample: SampleDisposition,
    /// `false` if a table was full when recording the outgoing thread
    pub tracked: bool,
}

/// One `sched_switch` event.
#[derive(Clone, Copy, Debug)]
pub struct SwitchEvent {
    pub prev_tid: u32,
    pub prev_state: i64,
    pub next_tid: u32,
    pub now_ns: u64,
}

/// Handle a context switch: close the incoming thread's off-CPU interval and
/// open one for the outgoing thread (plus a blocked timer if it is sleeping).
#[inline(always)]
pub fn on_switch<T, S>(offcpu: &T, blocked: &T, sink: &S, event: &SwitchEvent) -> SwitchOutcome
where
    T: ThreadTimers,
    S: SampleSink,
{
    let sample = match offcpu.take(event.next_tid) {
        Some(t0_ns) => {
            let record = OffCpuSample {
                tid: event.next_tid,
                tgid: 0,
                t0_ns,
                t2_ns: event.now_ns,
                delta_ns: event.now_ns.saturating_sub(t0_ns),
            };
            if sink.submit(&record) {
                SampleDisposition::Submitted
            } else {
                SampleDisposition::Dropped
            }
        }
        None => SampleDisposition::NoInterval,
    };

    // Preemption counts as off-CPU too, so the outgoing thread always gets a timer.
    let mut tracked = offcpu.start(event.prev_tid, event.now_ns);
    if event.prev_state != 0 {
        tracked &= blocked.start(event.prev_tid, event.now_ns);
    }

    SwitchOutcome { sample, tracked }
}

/// Handle `sched_wakeup` / `sched_wakeup_new` for `tid`.
///
/// Returns the histogram bucket that was incremented, or `None` if the thread
/// was never marked blocked.
#[inline(always)]
pub fn on_wakeup<T, C>(blocked: &T, hist: &C, tid: u32, now_ns: u64) -> Option<u32>
where
    T: ThreadTimers,
    C: BucketCounters,
{
    let t0_ns = blocked.take(tid)?;
    let bucket = blocked_bucket(now_ns.saturating_sub(t0_ns));
    hist.increment(bucket);
    Some(bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Table(RefCell<HashMap<u32, u64>>);

    impl ThreadTimers for Table {
        fn start(&self, tid: u32, now_ns: u64) -> bool {
            self.0.borrow_mut().insert(tid, now_ns);
            true
        }

        fn take(&self, tid: u32) -> Option<u64> {
            self.0.borrow_mut().remove(&tid)
        }
    }

    #[derive(Default)]
    struct Ring {
        samples: RefCell<Vec<OffCpuSample>>,
        full: bool,
    }

    impl SampleSink for Ring {
        fn submit(&self, sample: &OffCpuSample) -> bool {
            if self.full {
                return false;
            }
            self.samples.borrow_mut().push(*sample);
            true
        }
    }

    #[derive(Default)]
    struct Hist(RefCell<HashMap<u32, u64>>);

    impl BucketCounters for Hist {
        fn increment(&self, bucket: u32) {
            *self.0.borrow_mut().entry(bucket).or_default() += 1;
        }
    }

    fn switch(prev_tid: u32, prev_state: i64, next_tid: u32, now_ns: u64) -> SwitchEvent {
        SwitchEvent { prev_tid, prev_state, next_tid, now_ns }
    }

    #[test]
    fn test_switch_in_without_switch_out_emits_nothing() {
        let (off, blk, ring) = (Table::default(), Table::default(), Ring::default());
        let out = on_switch(&off, &blk, &ring, &switch(1, 0, 2, 100));
        assert_eq!(out.sample, SampleDisposition::NoInterval);
        assert!(ring.samples.borrow().is_empty());
        assert_eq!(off.0.borrow().get(&1), Some(&100));
    }

    #[test]
    fn test_interval_closes_exactly_once() {
        let (off, blk, ring) = (Table::default(), Table::default(), Ring::default());
        on_switch(&off, &blk, &ring, &switch(7, 0, 2, 1_000));
        on_switch(&off, &blk, &ring, &switch(2, 0, 7, 4_000));
        on_switch(&off, &blk, &ring, &switch(3, 0, 7, 9_000));

        let samples = ring.samples.borrow();
        assert_eq!(samples.len(), 1);
        assert_eq!(
            samples[0],
            OffCpuSample { tid: 7, tgid: 0, t0_ns: 1_000, t2_ns: 4_000, delta_ns: 3_000 }
        );
    }

    #[test]
    fn test_blocked_timer_only_for_sleeping_threads() {
        let (off, blk, ring) = (Table::default(), Table::default(), Ring::default());
        on_switch(&off, &blk, &ring, &switch(1, 0, 0, 10));
        on_switch(&off, &blk, &ring, &switch(2, 1, 0, 10));
        assert!(!blk.0.borrow().contains_key(&1));
        assert_eq!(blk.0.borrow().get(&2), Some(&10));
    }

    #[test]
    fn test_full_ring_reports_drop_and_still_consumes_entry() {
        let (off, blk) = (Table::default(), Table::default());
        let ring = Ring { full: true, ..Ring::default() };
        on_switch(&off, &blk, &ring, &switch(5, 0, 0, 10));
        let out = on_switch(&off, &blk, &ring, &switch(0, 0, 5, 20));
        assert_eq!(out.sample, SampleDisposition::Dropped);
        assert!(!off.0.borrow().contains_key(&5));
    }

    #[test]
    fn test_wakeup_without_blocked_entry_is_noop() {
        let (blk, hist) = (Table::default(), Hist::default());
        assert_eq!(on_wakeup(&blk, &hist, 9, 1_000_000), None);
        assert!(hist.0.borrow().is_empty());
    }

    #[test]
    fn test_wakeup_increments_bucket_once() {
        let (off, blk, ring, hist) =
            (Table::default(), Table::default(), Ring::default(), Hist::default());
        on_switch(&off, &blk, &ring, &switch(4, 2, 0, 1_000_000));
        assert_eq!(on_wakeup(&blk, &hist, 4, 4_000_000), Some(11));
        assert_eq!(on_wakeup(&blk, &hist, 4, 9_000_000), None);
        assert_eq!(hist.0.borrow().get(&11), Some(&1));
    }

    #[test]
    fn test_clock_going_backwards_yields_zero_delta() {
        let (off, blk, ring) = (Table::default(), Table::default(), Ring::default());
        on_switch(&off, &blk, &ring, &switch(1, 0, 0, 500));
        on_switch(&off, &blk, &ring, &switch(0, 0, 1, 400));
        assert_eq!(ring.samples.borrow()[0].delta_ns, 0);
    }
}

//! Drives the scheduler state machine through in-memory map implementations
//! and feeds its output through the userspace pipeline, as the probe and the
//! poll loop would.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use offcpu::analysis::{BlockedReport, BlockedTracker, OffCpuReport};
use offcpu::domain::{FilterMode, Pid, Tid};
use offcpu::profiling::{CounterSource, EventProcessor, OwnerLookup};
use offcpu::report::{Reporter, BLOCKED_TITLE, OFFCPU_TITLE};
use offcpu_common::capture::{
    on_switch, on_wakeup, BucketCounters, SampleSink, SwitchEvent, ThreadTimers,
};
use offcpu_common::OffCpuSample;

const MS: u64 = 1_000_000;

#[derive(Default)]
struct TimerTable(RefCell<HashMap<u32, u64>>);

impl ThreadTimers for TimerTable {
    fn start(&self, tid: u32, now_ns: u64) -> bool {
        self.0.borrow_mut().insert(tid, now_ns);
        true
    }

    fn take(&self, tid: u32) -> Option<u64> {
        self.0.borrow_mut().remove(&tid)
    }
}

/// Stores records as raw bytes, the way they come out of the ring buffer
#[derive(Default)]
struct ByteRing(RefCell<Vec<Vec<u8>>>);

impl SampleSink for ByteRing {
    fn submit(&self, sample: &OffCpuSample) -> bool {
        let mut bytes = Vec::with_capacity(std::mem::size_of::<OffCpuSample>());
        bytes.extend_from_slice(&sample.tid.to_ne_bytes());
        bytes.extend_from_slice(&sample.tgid.to_ne_bytes());
        bytes.extend_from_slice(&sample.t0_ns.to_ne_bytes());
        bytes.extend_from_slice(&sample.t2_ns.to_ne_bytes());
        bytes.extend_from_slice(&sample.delta_ns.to_ne_bytes());
        self.0.borrow_mut().push(bytes);
        true
    }
}

impl ByteRing {
    fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

struct BlockedCounters(RefCell<Vec<u64>>);

impl Default for BlockedCounters {
    fn default() -> Self {
        Self(RefCell::new(vec![0; 64]))
    }
}

impl BucketCounters for BlockedCounters {
    fn increment(&self, bucket: u32) {
        self.0.borrow_mut()[bucket as usize] += 1;
    }
}

impl CounterSource for BlockedCounters {
    fn snapshot(&self) -> Vec<u64> {
        self.0.borrow().clone()
    }
}

/// In-memory stand-in for the probe's maps
#[derive(Default)]
struct Kernel {
    offcpu: TimerTable,
    blocked: TimerTable,
    ring: ByteRing,
    hist: BlockedCounters,
}

impl Kernel {
    fn switch(&self, prev_tid: u32, prev_state: i64, next_tid: u32, now_ns: u64) {
        let event = SwitchEvent { prev_tid, prev_state, next_tid, now_ns };
        on_switch(&self.offcpu, &self.blocked, &self.ring, &event);
    }

    fn wakeup(&self, tid: u32, now_ns: u64) {
        on_wakeup(&self.blocked, &self.hist, tid, now_ns);
    }
}

struct Owners;

impl OwnerLookup for Owners {
    fn resolve_owner(&self, tid: Tid) -> Option<Pid> {
        match tid.0 {
            501 | 502 => Some(Pid(500)),
            601 => Some(Pid(600)),
            _ => None,
        }
    }
}

/// Thread 501 runs 2ms, blocks 3ms, is woken and switched back in; idle is tid 0.
fn run_sleep_cycles(kernel: &Kernel, cycles: u64) {
    let base = 1_000 * MS;
    for k in 0..cycles {
        let off_at = base + k * 5 * MS;
        kernel.switch(501, 1, 0, off_at);
        kernel.wakeup(501, off_at + 3 * MS);
        kernel.switch(0, 0, 501, off_at + 3 * MS);
    }
}

#[test]
fn test_sleep_cycles_global_mode() {
    let kernel = Kernel::default();
    run_sleep_cycles(&kernel, 10);

    let mut processor = EventProcessor::new(FilterMode::Global, Owners);
    for record in kernel.ring.drain() {
        processor.process_bytes(&record);
    }
    // 10 wakeups of 501 plus 9 completed idle periods of tid 0
    assert_eq!(processor.sample_count, 19);

    let OffCpuReport::Histogram { counts } = processor.finish_interval() else {
        panic!("expected histogram");
    };
    assert_eq!(counts[11], 10);
    assert_eq!(counts[10], 9);

    let mut tracker = BlockedTracker::new(FilterMode::Global);
    let BlockedReport::Histogram { counts: blocked } = tracker.observe(kernel.hist.snapshot())
    else {
        panic!("expected histogram");
    };
    assert_eq!(blocked[11], 10);
    assert_eq!(blocked.iter().sum::<u64>(), 10);
}

#[test]
fn test_sleep_cycles_process_mode() {
    let kernel = Kernel::default();
    run_sleep_cycles(&kernel, 10);

    let mut processor = EventProcessor::new(FilterMode::Process(Pid(500)), Owners);
    for record in kernel.ring.drain() {
        processor.process_bytes(&record);
    }
    assert_eq!(processor.filtered_out, 9);
    assert_eq!(
        processor.finish_interval(),
        OffCpuReport::Process { pid: Pid(500), interval_ns: 30 * MS, running_total_ns: 30 * MS }
    );

    // Midpoint of bucket 11 is 3071us
    let mut tracker = BlockedTracker::new(FilterMode::Process(Pid(500)));
    assert_eq!(
        tracker.observe(kernel.hist.snapshot()),
        BlockedReport::Process { pid: Pid(500), interval_us: 30_710, running_total_us: 30_710 }
    );
}

#[test]
fn test_sleep_cycles_rendered_output() {
    let kernel = Kernel::default();
    run_sleep_cycles(&kernel, 10);

    let mut processor = EventProcessor::new(FilterMode::Global, Owners);
    for record in kernel.ring.drain() {
        processor.process_bytes(&record);
    }
    let mut tracker = BlockedTracker::new(FilterMode::Global);

    let mut reporter = Reporter::new(Vec::new());
    reporter
        .print_interval(&processor.finish_interval(), &tracker.observe(kernel.hist.snapshot()))
        .unwrap();
    let text = String::from_utf8(reporter.into_inner()).unwrap();

    let full_row = format!("       2048 -> 4095       : 10       |{}|", "*".repeat(40));
    assert_eq!(text.matches(&full_row).count(), 2);
    assert!(text.find(OFFCPU_TITLE).unwrap() < text.find(BLOCKED_TITLE).unwrap());
}

#[test]
fn test_preempted_thread_is_not_blocked() {
    let kernel = Kernel::default();
    // 601 is preempted (prev_state 0) then woken and switched back in
    kernel.switch(601, 0, 602, 10 * MS);
    kernel.wakeup(601, 11 * MS);
    kernel.switch(602, 0, 601, 12 * MS);

    assert_eq!(kernel.hist.snapshot().iter().sum::<u64>(), 0);
    let records = kernel.ring.drain();
    assert_eq!(records.len(), 1);

    let sample = offcpu::profiling::parse_sample(&records[0]).unwrap();
    assert_eq!((sample.tid, sample.delta_ns), (601, 2 * MS));
}

#[test]
fn test_interval_reset_and_running_total() {
    let kernel = Kernel::default();
    let mut global = EventProcessor::new(FilterMode::Global, Owners);
    let mut filtered = EventProcessor::new(FilterMode::Process(Pid(500)), Owners);

    let mut last_total = 0;
    for interval in 0..3u64 {
        let base = interval * 1_000 * MS;
        kernel.switch(502, 0, 0, base);
        kernel.switch(0, 0, 502, base + 4 * MS);
        for record in kernel.ring.drain() {
            global.process_bytes(&record);
            filtered.process_bytes(&record);
        }

        // Global histograms never carry samples over
        let OffCpuReport::Histogram { counts } = global.finish_interval() else {
            panic!("expected histogram");
        };
        assert_eq!(counts.iter().sum::<u64>(), if interval == 0 { 1 } else { 2 });

        let OffCpuReport::Process { running_total_ns, .. } = filtered.finish_interval() else {
            panic!("expected process report");
        };
        assert!(running_total_ns >= last_total);
        last_total = running_total_ns;
    }
    assert_eq!(last_total, 12 * MS);
}

/// Small deterministic generator for randomized switch sequences
struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

#[test]
fn test_random_switch_sequences_pair_switch_outs_with_switch_ins() {
    for seed in 1..20u64 {
        let kernel = Kernel::default();
        let mut rng = Lcg(seed);
        let mut now = 0u64;
        let mut switched_out: HashMap<u32, u64> = HashMap::new();
        let mut expected: Vec<(u32, u64)> = Vec::new();
        let mut expected_blocked = 0u64;
        let mut blocked_tids: HashSet<u32> = HashSet::new();

        for _ in 0..500 {
            now += rng.next_u64() % (5 * MS);
            let prev = (rng.next_u64() % 8) as u32 + 1;
            let next = (rng.next_u64() % 8) as u32 + 1;
            let state = i64::from(rng.next_u64() % 3 == 0);

            if let Some(t0) = switched_out.remove(&next) {
                expected.push((next, now - t0));
            }
            switched_out.insert(prev, now);
            if state != 0 {
                blocked_tids.insert(prev);
            }
            kernel.switch(prev, state, next, now);

            if rng.next_u64() % 2 == 0 {
                let woken = (rng.next_u64() % 8) as u32 + 1;
                if blocked_tids.remove(&woken) {
                    expected_blocked += 1;
                }
                kernel.wakeup(woken, now);
            }
        }

        let samples: Vec<(u32, u64)> = kernel
            .ring
            .drain()
            .iter()
            .map(|bytes| {
                let s = offcpu::profiling::parse_sample(bytes).unwrap();
                assert_eq!(s.t2_ns - s.t0_ns, s.delta_ns);
                (s.tid, s.delta_ns)
            })
            .collect();
        assert_eq!(samples, expected, "seed {seed}");
        assert_eq!(kernel.hist.snapshot().iter().sum::<u64>(), expected_blocked, "seed {seed}");
    }
}

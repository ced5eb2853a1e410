//! Log2 bucketing shared by the kernel histogram and userspace rendering.
//!
//! Bucket `b` covers `[2^b, 2^(b+1) - 1]` microseconds, except bucket 0 which
//! covers `[0, 1]`.

use crate::BLOCKED_HIST_BUCKETS;

/// `floor(log2(v))`, with 0 and 1 both mapping to 0.
///
/// Written as a fixed sequence of shifts so the eBPF verifier sees no loop.
#[inline(always)]
#[must_use]
pub const fn log2_u64(mut v: u64) -> u32 {
    let mut r = 0;
    if v >> 32 != 0 {
        v >>= 32;
        r += 32;
    }
    if v >> 16 != 0 {
        v >>= 16;
        r += 16;
    }
    if v >> 8 != 0 {
        v >>= 8;
        r += 8;
    }
    if v >> 4 != 0 {
        v >>= 4;
        r += 4;
    }
    if v >> 2 != 0 {
        v >>= 2;
        r += 2;
    }
    if v >> 1 != 0 {
        r += 1;
    }
    r
}

/// Bucket of a nanosecond duration on the microsecond log2 scale (unclamped).
#[inline(always)]
#[must_use]
pub const fn usecs_bucket(delta_ns: u64) -> u32 {
    log2_u64(delta_ns / 1000)
}

/// Bucket of a blocked duration, clamped to the kernel histogram size.
#[inline(always)]
#[must_use]
pub const fn blocked_bucket(delta_ns: u64) -> u32 {
    let bucket = usecs_bucket(delta_ns);
    if bucket >= BLOCKED_HIST_BUCKETS {
        BLOCKED_HIST_BUCKETS - 1
    } else {
        bucket
    }
}

/// Inclusive lower bound of bucket `b` in microseconds.
#[must_use]
pub const fn bucket_lower(b: u32) -> u64 {
    if b == 0 {
        0
    } else if b >= 64 {
        u64::MAX
    } else {
        1 << b
    }
}

/// Inclusive upper bound of bucket `b` in microseconds, saturating at `u64::MAX`.
#[must_use]
pub const fn bucket_upper(b: u32) -> u64 {
    if b >= 63 {
        u64::MAX
    } else {
        (1 << (b + 1)) - 1
    }
}

/// Midpoint of bucket `b`, used to estimate a total from counts alone.
#[must_use]
pub const fn bucket_midpoint(b: u32) -> u64 {
    let lower = bucket_lower(b);
    let upper = bucket_upper(b);
    lower + (upper - lower) / 2
}

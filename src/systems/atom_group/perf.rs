//! Thread-local counters for the travel hot path.
//!
//! Travel runs on one thread per world; plain `Cell` counters keep the
//! bookkeeping free of atomics. `take_stats` reads and resets, so each
//! sample covers exactly one frame.

use std::cell::Cell;

thread_local! {
    static TRAVEL_SEGMENTS: Cell<u32> = const { Cell::new(0) };
    static TRAVEL_STEPS: Cell<u64> = const { Cell::new(0) };
    static TRAVEL_HITS: Cell<u32> = const { Cell::new(0) };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TravelStats {
    /// Trajectory segments walked this frame.
    pub segments: u32,
    /// Individual atom raster steps taken.
    pub steps: u64,
    /// Collisions that produced an impulse.
    pub hits: u32,
}

#[inline]
pub fn record_segment() {
    TRAVEL_SEGMENTS.with(|c| c.set(c.get() + 1));
}

#[inline]
pub fn record_steps(n: u64) {
    TRAVEL_STEPS.with(|c| c.set(c.get() + n));
}

#[inline]
pub fn record_hit() {
    TRAVEL_HITS.with(|c| c.set(c.get() + 1));
}

/// Snapshot the counters and reset them to zero.
pub fn take_stats() -> TravelStats {
    TravelStats {
        segments: TRAVEL_SEGMENTS.with(|c| c.replace(0)),
        steps: TRAVEL_STEPS.with(|c| c.replace(0)),
        hits: TRAVEL_HITS.with(|c| c.replace(0)),
    }
}

//! Evacuation failure bookkeeping for region based copying collectors.
//!
//! When a collection pause cannot copy an object out of its region the object stays in
//! place and has to be repaired after the pause. [`RegionFailureTracker`] remembers
//! such objects per region with very little overhead while many collector threads
//! report failures at once, and replays them afterwards in ascending address order.
//! [`EvacFailureRegions`] keeps one tracker per failed region of the heap.
//!
//! [`RegionFailureTracker`]: evac_failure_objs::RegionFailureTracker
//! [`EvacFailureRegions`]: evac_failure_regions::EvacFailureRegions

macro_rules! logln_if {
    ($cond: expr, $($t:tt)*) => {
        if $cond {
            log::info!($($t)*);
        }
    };
}

pub mod evac_failure_objs;
pub mod evac_failure_regions;
pub mod fatal;
pub mod globals;
pub mod internal;
pub mod region;
pub mod segmented_log;
pub mod statistics;
pub mod util;
pub mod visitor;


pub use evac_failure_objs::RegionFailureTracker;
pub use evac_failure_regions::EvacFailureRegions;
pub use internal::segment_allocator::{MallocAllocator, SegmentAllocator, SegmentPool};
pub use region::RegionGeometry;
pub use segmented_log::SegmentedLog;
pub use statistics::EvacFailureStatistics;
pub use visitor::ObjectVisitor;

/// Configuration for [`EvacFailureRegions`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Prints geometry and per-pause statistics through `log`.
    pub verbose: bool,
    /// Released log segments kept for reuse by the next pause.
    pub pool_segments: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            pool_segments: globals::DEFAULT_POOL_SEGMENTS,
        }
    }
}

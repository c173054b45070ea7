use std::{
    mem::size_of,
    ptr::null_mut,
    sync::{
        atomic::{AtomicPtr, AtomicUsize},
        Arc,
    },
};

use atomic::Ordering;
use crossbeam_utils::thread;
use parking_lot::Mutex;

use crate::{
    evac_failure_objs::{Elem, RegionFailureTracker},
    globals::SEGMENT_LENGTH,
    internal::{
        segment::Segment,
        segment_allocator::{SegmentAllocator, SegmentPool},
    },
    region::RegionGeometry,
    statistics::EvacFailureStatistics,
    Config,
};

const BITS_PER_INTPTR: usize = size_of::<usize>() * 8;

/// Regions that experienced an evacuation failure during the current pause, together
/// with the failed objects of each of them.
///
/// Trackers are created on a region's first failure and kept afterwards, so later
/// pauses only pay for resetting them.
pub struct EvacFailureRegions<A: SegmentAllocator + Clone = Arc<SegmentPool>> {
    geometry: RegionGeometry,
    heap_base: *mut u8,
    config: Config,
    allocator: A,
    trackers: Box<[AtomicPtr<RegionFailureTracker<A>>]>,
    failed_bitmap: Box<[AtomicUsize]>,
    /// Failed region indices in order of first failure. Also serializes tracker creation.
    failed: Mutex<Vec<u32>>,
}

unsafe impl<A: SegmentAllocator + Clone> Send for EvacFailureRegions<A> {}
unsafe impl<A: SegmentAllocator + Clone> Sync for EvacFailureRegions<A> {}

impl EvacFailureRegions<Arc<SegmentPool>> {
    pub fn new(geometry: RegionGeometry, heap_base: *mut u8, config: Config) -> Self {
        let pool = Arc::new(SegmentPool::new(config.pool_segments));
        Self::with_allocator(geometry, heap_base, config, pool)
    }
}

impl<A: SegmentAllocator + Clone> EvacFailureRegions<A> {
    pub fn with_allocator(
        geometry: RegionGeometry,
        heap_base: *mut u8,
        config: Config,
        allocator: A,
    ) -> Self {
        let trackers = (0..geometry.region_count)
            .map(|_| AtomicPtr::new(null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let failed_bitmap = (0..(geometry.region_count + BITS_PER_INTPTR - 1) / BITS_PER_INTPTR)
            .map(|_| AtomicUsize::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        logln_if!(config.verbose, "{:?}", geometry);
        Self {
            geometry,
            heap_base,
            config,
            allocator,
            trackers,
            failed_bitmap,
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn geometry(&self) -> &RegionGeometry {
        &self.geometry
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    #[inline]
    pub fn contains(&self, region_idx: u32) -> bool {
        let idx = region_idx as usize;
        let word = self.failed_bitmap[idx / BITS_PER_INTPTR].load(Ordering::Acquire);
        word & (1 << (idx % BITS_PER_INTPTR)) != 0
    }

    pub fn num_regions_failed(&self) -> usize {
        self.failed.lock().len()
    }

    pub fn has_regions_failed(&self) -> bool {
        self.num_regions_failed() > 0
    }

    /// Indices of all failed regions in ascending order.
    pub fn failed_regions(&self) -> Vec<u32> {
        let mut regions = self.failed.lock().clone();
        regions.sort_unstable();
        regions
    }

    /// Records `object` of region `region_idx` as failed. Returns `true` when this is
    /// the region's first failure of the pause.
    pub fn record(&self, region_idx: u32, object: *const u8) -> bool {
        assert!(
            (region_idx as usize) < self.geometry.region_count,
            "region {} is outside of the heap ({} regions)",
            region_idx,
            self.geometry.region_count
        );
        let (tracker, first) = if self.contains(region_idx) {
            (self.trackers[region_idx as usize].load(Ordering::Acquire), false)
        } else {
            self.prepare_region(region_idx)
        };
        debug_assert!(!tracker.is_null());
        unsafe {
            (*tracker).record(object);
        }
        first
    }

    /// Like [`record`](Self::record), deriving the region from the object address.
    pub fn record_object(&self, object: *const u8) -> bool {
        let idx = self.geometry.region_index_for(self.heap_base, object);
        self.record(idx as u32, object)
    }

    #[cold]
    fn prepare_region(&self, region_idx: u32) -> (*mut RegionFailureTracker<A>, bool) {
        let idx = region_idx as usize;
        let mut failed = self.failed.lock();
        let published = &self.trackers[idx];
        if self.contains(region_idx) {
            return (published.load(Ordering::Acquire), false);
        }

        let mut tracker = published.load(Ordering::Acquire);
        if tracker.is_null() {
            tracker = Box::into_raw(Box::new(RegionFailureTracker::with_allocator(
                region_idx,
                self.geometry.region_bottom(self.heap_base, idx),
                &self.geometry,
                self.allocator.clone(),
            )));
            published.store(tracker, Ordering::Release);
        }
        failed.push(region_idx);
        self.failed_bitmap[idx / BITS_PER_INTPTR]
            .fetch_or(1 << (idx % BITS_PER_INTPTR), Ordering::Release);
        log::debug!("region {} experienced evacuation failure", region_idx);
        (tracker, true)
    }

    /// Counters of what has been recorded so far in this pause.
    pub fn statistics(&self) -> EvacFailureStatistics {
        let mut stats = EvacFailureStatistics::default();
        for &idx in self.failed.lock().iter() {
            let tracker = unsafe { &*self.trackers[idx as usize].load(Ordering::Acquire) };
            stats.account_region(
                tracker.num_recorded(),
                tracker.num_segments(),
                Segment::<Elem, SEGMENT_LENGTH>::SIZE,
            );
        }
        stats
    }

    /// Trackers of failed regions in ascending region order.
    fn failed_trackers(&mut self) -> Vec<&mut RegionFailureTracker<A>> {
        let bitmap = &self.failed_bitmap;
        self.trackers
            .iter_mut()
            .enumerate()
            .filter(|(idx, _)| {
                bitmap[idx / BITS_PER_INTPTR].load(Ordering::Relaxed) & (1 << (idx % BITS_PER_INTPTR))
                    != 0
            })
            .map(|(_, tracker)| unsafe { &mut **tracker.get_mut() })
            .collect()
    }

    /// Replays the failed objects of every failed region, regions in ascending order and
    /// objects in ascending address order, then resets for the next pause.
    pub fn iterate(&mut self, mut visitor: impl FnMut(u32, *mut u8)) -> EvacFailureStatistics {
        let mut stats = EvacFailureStatistics::default();
        for tracker in self.failed_trackers() {
            let region_idx = tracker.region_index();
            replay_region(tracker, &mut stats, &mut |object| visitor(region_idx, object));
        }
        self.finish_pause(&stats);
        stats
    }

    /// Like [`iterate`](Self::iterate) but spreads regions over up to `workers` threads.
    /// Every region is replayed by exactly one worker.
    pub fn par_iterate<F>(&mut self, workers: usize, visitor: F) -> EvacFailureStatistics
    where
        F: Fn(u32, *mut u8) + Sync,
    {
        let work = self
            .failed_trackers()
            .into_iter()
            .map(Mutex::new)
            .collect::<Vec<_>>();
        let workers = workers.max(1).min(work.len());
        let claimed = AtomicUsize::new(0);

        let result = thread::scope(|s| {
            let (work, claimed, visitor) = (&work, &claimed, &visitor);
            let handles = (0..workers)
                .map(|_| {
                    s.spawn(move |_| {
                        let mut stats = EvacFailureStatistics::default();
                        loop {
                            let claim = claimed.fetch_add(1, Ordering::Relaxed);
                            if claim >= work.len() {
                                break stats;
                            }
                            let mut tracker = work[claim].lock();
                            let region_idx = tracker.region_index();
                            replay_region(&mut **tracker, &mut stats, &mut |object| {
                                visitor(region_idx, object)
                            });
                        }
                    })
                })
                .collect::<Vec<_>>();

            let mut stats = EvacFailureStatistics::default();
            for handle in handles {
                match handle.join() {
                    Ok(partial) => stats.merge(&partial),
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
            stats
        });
        drop(work);

        let stats = match result {
            Ok(stats) => stats,
            Err(payload) => std::panic::resume_unwind(payload),
        };
        self.finish_pause(&stats);
        stats
    }

    fn finish_pause(&mut self, stats: &EvacFailureStatistics) {
        logln_if!(self.config.verbose, "{}", stats);
        self.clear_failed();
    }

    fn clear_failed(&mut self) {
        self.failed.get_mut().clear();
        for word in self.failed_bitmap.iter_mut() {
            *word.get_mut() = 0;
        }
    }

    /// Discards this pause's records without replaying them.
    pub fn reset(&mut self) {
        for tracker in self.failed_trackers() {
            tracker.reset();
        }
        self.clear_failed();
    }
}

fn replay_region<A: SegmentAllocator>(
    tracker: &mut RegionFailureTracker<A>,
    stats: &mut EvacFailureStatistics,
    visitor: &mut dyn FnMut(*mut u8),
) {
    let recorded = tracker.num_recorded();
    stats.account_region(
        recorded,
        tracker.num_segments(),
        Segment::<Elem, SEGMENT_LENGTH>::SIZE,
    );
    let replayed = tracker.iterate(visitor);
    stats.account_replay(recorded, replayed);
}

impl<A: SegmentAllocator + Clone> Drop for EvacFailureRegions<A> {
    fn drop(&mut self) {
        for published in self.trackers.iter_mut() {
            let tracker = std::mem::replace(published.get_mut(), null_mut());
            if !tracker.is_null() {
                unsafe {
                    drop(Box::from_raw(tracker));
                }
            }
        }
    }
}

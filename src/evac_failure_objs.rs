//! Objects of one region that failed to evacuate during the current pause.
//!
//! Collector workers `record` failed objects concurrently as compact word offsets from
//! the region bottom. Once the pause is over, a single thread `iterate`s them in
//! ascending address order, each distinct object exactly once, so that the repair
//! pass can walk the region without scanning it word by word.

use crate::{
    globals::{HEAP_WORD_SIZE, LOG_HEAP_WORD_SIZE, SEGMENT_LENGTH},
    internal::segment_allocator::{MallocAllocator, SegmentAllocator},
    region::RegionGeometry,
    segmented_log::SegmentedLog,
    util::is_aligned,
    visitor::ObjectVisitor,
};

/// Word offset of an object from the bottom of its region.
pub type Elem = u32;

pub type OffsetLog<A> = SegmentedLog<Elem, SEGMENT_LENGTH, A>;

pub struct RegionFailureTracker<A: SegmentAllocator = MallocAllocator> {
    offset_mask: u64,
    region_idx: u32,
    bottom: *mut u8,
    offsets: OffsetLog<A>,
}

unsafe impl<A: SegmentAllocator> Send for RegionFailureTracker<A> {}
unsafe impl<A: SegmentAllocator> Sync for RegionFailureTracker<A> {}

impl RegionFailureTracker<MallocAllocator> {
    pub fn new(region_idx: u32, bottom: *mut u8, geometry: &RegionGeometry) -> Self {
        Self::with_allocator(region_idx, bottom, geometry, MallocAllocator)
    }
}

impl<A: SegmentAllocator> RegionFailureTracker<A> {
    pub fn with_allocator(
        region_idx: u32,
        bottom: *mut u8,
        geometry: &RegionGeometry,
        allocator: A,
    ) -> Self {
        debug_assert!(is_aligned(bottom as usize, HEAP_WORD_SIZE));
        debug_assert!(geometry.offset_mask <= Elem::MAX as u64);
        Self {
            offset_mask: geometry.offset_mask,
            region_idx,
            bottom,
            offsets: SegmentedLog::with_allocator(geometry.max_segments, allocator),
        }
    }

    #[inline]
    pub fn region_index(&self) -> u32 {
        self.region_idx
    }

    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        self.bottom
    }

    /// Records made so far, duplicates included.
    #[inline]
    pub fn num_recorded(&self) -> usize {
        self.offsets.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn num_segments(&self) -> usize {
        self.offsets.num_segments()
    }

    #[inline]
    fn cast_from_offset(&self, offset: Elem) -> *mut u8 {
        self.bottom
            .wrapping_add((offset as usize) << LOG_HEAP_WORD_SIZE)
    }

    #[inline]
    fn cast_from_addr(&self, object: *const u8) -> Elem {
        debug_assert!(
            is_aligned(object as usize, HEAP_WORD_SIZE),
            "object {:p} is not word aligned",
            object
        );
        let offset = (object as usize).wrapping_sub(self.bottom as usize) >> LOG_HEAP_WORD_SIZE;
        assert!(
            offset as u64 <= self.offset_mask,
            "object {:p} does not belong to region {} at {:p}",
            object,
            self.region_idx,
            self.bottom
        );
        offset as Elem
    }

    /// Remembers that `object` failed to evacuate. Callable from any number of
    /// threads at once.
    #[inline]
    pub fn record(&self, object: *const u8) {
        self.offsets.add(self.cast_from_addr(object));
    }

    /// Sorted, duplicate free copy of everything recorded.
    fn compact(&mut self) -> Vec<Elem> {
        let mut offsets = Vec::with_capacity(self.offsets.count());
        self.offsets
            .iterate_segments(|segment| offsets.extend_from_slice(segment));
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    /// Replays every distinct recorded object in ascending address order and clears
    /// the tracker. Returns the number of objects visited.
    pub fn iterate<V: ObjectVisitor + ?Sized>(&mut self, visitor: &mut V) -> usize {
        let recorded = self.offsets.count();
        let offsets = self.compact();
        log::debug!(
            "region {}: replaying {} failed objects ({} records)",
            self.region_idx,
            offsets.len(),
            recorded
        );
        for &offset in offsets.iter() {
            visitor.visit(self.cast_from_offset(offset));
        }
        self.offsets.reset();
        offsets.len()
    }

    /// Drops all records without replaying them.
    pub fn reset(&mut self) {
        self.offsets.reset();
    }
}

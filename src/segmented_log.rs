//! Lock-free, append-only log built from fixed size segments.
//!
//! Writers reserve a `(segment, slot)` coordinate by bumping a packed [`Cursor`] with
//! a compare-and-swap. Whoever reserves slot 0 of a segment allocates it and publishes
//! the pointer; writers landing later in the same segment wait for that publication
//! before storing their element. Replay and reset take `&mut self`, which rules out
//! writers still being in flight.

use std::{
    marker::PhantomData,
    ptr::null_mut,
    sync::atomic::{AtomicPtr, AtomicUsize},
};

use atomic::{Atomic, Ordering};
use crossbeam_utils::{Backoff, CachePadded};

use crate::{
    fatal::capacity_exhausted,
    internal::{
        cursor::Cursor,
        segment::Segment,
        segment_allocator::{MallocAllocator, SegmentAllocator},
    },
};

pub struct SegmentedLog<E: Copy, const LEN: usize, A: SegmentAllocator = MallocAllocator> {
    cursor: CachePadded<Atomic<Cursor>>,
    elements: CachePadded<AtomicUsize>,
    segments: Box<[AtomicPtr<Segment<E, LEN>>]>,
    allocator: A,
    marker: PhantomData<*mut E>,
}

unsafe impl<E: Copy + Send, const LEN: usize, A: SegmentAllocator> Send
    for SegmentedLog<E, LEN, A>
{
}
unsafe impl<E: Copy + Send, const LEN: usize, A: SegmentAllocator> Sync
    for SegmentedLog<E, LEN, A>
{
}

impl<E: Copy, const LEN: usize> SegmentedLog<E, LEN, MallocAllocator> {
    pub fn new(max_segments: usize) -> Self {
        Self::with_allocator(max_segments, MallocAllocator)
    }
}

impl<E: Copy, const LEN: usize, A: SegmentAllocator> SegmentedLog<E, LEN, A> {
    pub const SEGMENT_LENGTH: usize = LEN;

    /// Creates an empty log able to hold `max_segments * LEN` elements. No segment is
    /// allocated until the first `add`.
    pub fn with_allocator(max_segments: usize, allocator: A) -> Self {
        assert!(LEN > 0 && LEN as u64 <= u32::MAX as u64, "invalid segment length {}", LEN);
        assert!(
            max_segments > 0 && max_segments as u64 <= u32::MAX as u64,
            "invalid segment count {}",
            max_segments
        );
        let layout = Segment::<E, LEN>::layout();
        assert!(
            layout.size() > 0 && layout.align() <= allocator.max_align(),
            "segment layout {:?} is not supported by the segment allocator (max alignment {})",
            layout,
            allocator.max_align()
        );
        debug_assert!(Atomic::<Cursor>::is_lock_free());
        let segments = (0..max_segments)
            .map(|_| AtomicPtr::new(null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            cursor: CachePadded::new(Atomic::new(Cursor::ZERO)),
            elements: CachePadded::new(AtomicUsize::new(0)),
            segments,
            allocator,
            marker: PhantomData,
        }
    }

    pub fn max_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn capacity(&self) -> usize {
        self.segments.len() * LEN
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Number of completed insertions. Not linearized with concurrent `add`s.
    #[inline]
    pub fn count(&self) -> usize {
        self.elements.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Number of segments currently published.
    pub fn num_segments(&self) -> usize {
        let pos = self.cursor.load(Ordering::Acquire);
        let last = pos.segment().min(self.segments.len() - 1);
        self.segments[..=last]
            .iter()
            .filter(|segment| !segment.load(Ordering::Acquire).is_null())
            .count()
    }

    /// Appends `elem`. Safe to call from any number of threads at once.
    pub fn add(&self, elem: E) {
        let pos = self.reserve();
        let (segment_idx, slot) = (pos.segment(), pos.slot());
        let published = &self.segments[segment_idx];

        let segment = if slot == 0 {
            let segment = Segment::<E, LEN>::create(&self.allocator);
            log::trace!("segmented log: allocated segment {} at {:p}", segment_idx, segment);
            published.store(segment, Ordering::Release);
            segment
        } else {
            let backoff = Backoff::new();
            loop {
                let segment = published.load(Ordering::Acquire);
                if !segment.is_null() {
                    break segment;
                }
                backoff.snooze();
            }
        };

        unsafe {
            Segment::write(segment, slot, elem);
        }
        self.elements.fetch_add(1, Ordering::Release);
    }

    /// Claims the current cursor position for the calling thread.
    #[inline]
    fn reserve(&self) -> Cursor {
        let backoff = Backoff::new();
        let mut pos = self.cursor.load(Ordering::Relaxed);
        loop {
            if pos.segment() >= self.segments.len() {
                capacity_exhausted(pos.segment(), self.segments.len(), LEN);
            }
            match self.cursor.compare_exchange_weak(
                pos,
                pos.next(LEN),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return pos,
                Err(actual) => {
                    pos = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Visits the populated prefix of every segment in insertion-slot order.
    /// The last slice may be shorter than `LEN`.
    pub fn iterate_segments(&mut self, mut visitor: impl FnMut(&[E])) {
        let pos = self.cursor.load(Ordering::Acquire);
        let (hi, lo) = (pos.segment(), pos.slot());
        for (i, published) in self.segments.iter_mut().enumerate().take(hi + 1) {
            let limit = if i == hi { lo } else { LEN };
            if limit == 0 {
                break;
            }
            let segment = *published.get_mut();
            debug_assert!(!segment.is_null(), "segment {} was never published", i);
            visitor(unsafe { Segment::as_slice(segment, limit) });
        }
    }

    pub fn iterate_elements(&mut self, mut visitor: impl FnMut(E)) {
        let mut total = 0;
        self.iterate_segments(|elems| {
            total += elems.len();
            elems.iter().copied().for_each(&mut visitor);
        });
        debug_assert_eq!(total, self.count());
    }

    /// Frees every segment and rewinds the cursor, leaving the log as if just created.
    pub fn reset(&mut self) {
        let pos = *self.cursor.get_mut();
        let last = pos.segment().min(self.segments.len() - 1);
        for published in self.segments[..=last].iter_mut() {
            let segment = std::mem::replace(published.get_mut(), null_mut());
            if !segment.is_null() {
                unsafe {
                    Segment::destroy(segment, &self.allocator);
                }
            }
        }
        *self.cursor.get_mut() = Cursor::ZERO;
        *self.elements.get_mut() = 0;
    }
}

impl<E: Copy, const LEN: usize, A: SegmentAllocator> Drop for SegmentedLog<E, LEN, A> {
    fn drop(&mut self) {
        self.reset();
    }
}

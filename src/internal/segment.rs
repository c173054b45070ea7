use std::{alloc::Layout, mem::MaybeUninit, ptr::addr_of_mut};

use super::segment_allocator::SegmentAllocator;
use crate::fatal::segment_oom;

/// Fixed capacity growth unit of a [`SegmentedLog`](crate::segmented_log::SegmentedLog).
///
/// Segments live in raw memory obtained from a [`SegmentAllocator`] and are only ever
/// handled through raw pointers: many writers fill disjoint slots of the same segment
/// at once, so no reference to the whole buffer may exist while it is shared.
#[repr(C)]
pub struct Segment<E: Copy, const LEN: usize> {
    slots: [MaybeUninit<E>; LEN],
}

impl<E: Copy, const LEN: usize> Segment<E, LEN> {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    #[inline]
    pub fn layout() -> Layout {
        Layout::new::<Self>()
    }

    /// Allocates an uninitialized segment. Aborts the process when the allocator is
    /// exhausted.
    pub fn create(allocator: &impl SegmentAllocator) -> *mut Self {
        let memory = allocator.allocate(Self::layout());
        if memory.is_null() {
            segment_oom(Self::SIZE);
        }
        memory.cast()
    }

    /// # Safety
    ///
    /// `this` must come from [`Segment::create`] on `allocator` and must not be used
    /// afterwards.
    pub unsafe fn destroy(this: *mut Self, allocator: &impl SegmentAllocator) {
        allocator.deallocate(this.cast(), Self::layout());
    }

    /// # Safety
    ///
    /// `idx < LEN`, and the caller must own slot `idx` exclusively.
    #[inline]
    pub unsafe fn write(this: *mut Self, idx: usize, elem: E) {
        debug_assert!(idx < LEN);
        addr_of_mut!((*this).slots)
            .cast::<E>()
            .add(idx)
            .write(elem);
    }

    /// # Safety
    ///
    /// The first `limit` slots must be initialized and no writer may be active.
    #[inline]
    pub unsafe fn as_slice<'a>(this: *const Self, limit: usize) -> &'a [E] {
        debug_assert!(limit <= LEN);
        std::slice::from_raw_parts(std::ptr::addr_of!((*this).slots).cast::<E>(), limit)
    }
}

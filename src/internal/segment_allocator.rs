use std::{
    alloc::Layout,
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use crate::globals::{DEFAULT_POOL_SEGMENTS, MALLOC_ALIGNMENT};

/// Backing memory for log segments.
///
/// # Safety
///
/// `allocate` must return either null or a pointer to at least `layout.size()` writable
/// bytes aligned to `layout.align()` that stays valid until it is handed back to
/// `deallocate` with the same layout.
pub unsafe trait SegmentAllocator: Send + Sync {
    /// Returns null when no memory is available.
    fn allocate(&self, layout: Layout) -> *mut u8;
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this allocator with the same `layout`.
    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout);

    /// Largest alignment `allocate` honours.
    fn max_align(&self) -> usize {
        MALLOC_ALIGNMENT
    }
}

/// Segments straight from the C heap.
#[derive(Clone, Copy, Default, Debug)]
pub struct MallocAllocator;

unsafe impl SegmentAllocator for MallocAllocator {
    fn allocate(&self, layout: Layout) -> *mut u8 {
        debug_assert!(layout.align() <= MALLOC_ALIGNMENT);
        unsafe { libc::malloc(layout.size()).cast() }
    }

    unsafe fn deallocate(&self, ptr: *mut u8, _layout: Layout) {
        libc::free(ptr.cast());
    }
}

unsafe impl<A: SegmentAllocator> SegmentAllocator for Arc<A> {
    fn allocate(&self, layout: Layout) -> *mut u8 {
        (**self).allocate(layout)
    }
    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
    fn max_align(&self) -> usize {
        (**self).max_align()
    }
}

unsafe impl<'a, A: SegmentAllocator> SegmentAllocator for &'a A {
    fn allocate(&self, layout: Layout) -> *mut u8 {
        (**self).allocate(layout)
    }
    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }
    fn max_align(&self) -> usize {
        (**self).max_align()
    }
}

struct FreeSegments {
    layout: Option<Layout>,
    segments: Vec<NonNull<u8>>,
}

/// Keeps up to `capacity` released segments so that trackers reset at the end of a
/// pause can refill without going back to the backing allocator.
///
/// All segments handed to one pool must share a single layout.
pub struct SegmentPool<A: SegmentAllocator = MallocAllocator> {
    backing: A,
    capacity: usize,
    free: Mutex<FreeSegments>,
    /// Segments currently held from `backing`, cached or handed out.
    allocated: AtomicUsize,
}

unsafe impl<A: SegmentAllocator> Send for SegmentPool<A> {}
unsafe impl<A: SegmentAllocator> Sync for SegmentPool<A> {}

impl SegmentPool<MallocAllocator> {
    pub fn new(capacity: usize) -> Self {
        Self::with_backing(MallocAllocator, capacity)
    }
}

impl Default for SegmentPool<MallocAllocator> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SEGMENTS)
    }
}

impl<A: SegmentAllocator> SegmentPool<A> {
    pub fn with_backing(backing: A, capacity: usize) -> Self {
        Self {
            backing,
            capacity,
            free: Mutex::new(FreeSegments {
                layout: None,
                segments: Vec::with_capacity(capacity),
            }),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Number of released segments waiting for reuse.
    pub fn cached(&self) -> usize {
        self.free.lock().segments.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of segments obtained from the backing allocator and not yet returned
    /// to it, whether cached here or in use by a log.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Frees every cached segment.
    pub fn purge(&self) {
        let mut free = self.free.lock();
        if let Some(layout) = free.layout {
            while let Some(segment) = free.segments.pop() {
                unsafe {
                    self.backing.deallocate(segment.as_ptr(), layout);
                }
                self.allocated.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }
}

unsafe impl<A: SegmentAllocator> SegmentAllocator for SegmentPool<A> {
    fn allocate(&self, layout: Layout) -> *mut u8 {
        {
            let mut free = self.free.lock();
            debug_assert!(free.layout.map_or(true, |l| l == layout));
            if let Some(segment) = free.segments.pop() {
                return segment.as_ptr();
            }
        }
        let segment = self.backing.allocate(layout);
        if !segment.is_null() {
            self.allocated.fetch_add(1, Ordering::Relaxed);
        }
        segment
    }

    unsafe fn deallocate(&self, ptr: *mut u8, layout: Layout) {
        let mut free = self.free.lock();
        debug_assert!(free.layout.map_or(true, |l| l == layout));
        if free.segments.len() < self.capacity {
            free.layout = Some(layout);
            free.segments.push(NonNull::new_unchecked(ptr));
        } else {
            drop(free);
            self.backing.deallocate(ptr, layout);
            self.allocated.fetch_sub(1, Ordering::Relaxed);
        }
    }

    fn max_align(&self) -> usize {
        self.backing.max_align()
    }
}

impl<A: SegmentAllocator> Drop for SegmentPool<A> {
    fn drop(&mut self) {
        self.purge();
    }
}

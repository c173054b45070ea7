//! Unrecoverable failures while recording evacuation failures.
//!
//! A dropped record would leave an object without its post-pause repair and corrupt
//! the heap later, so none of these paths unwind: they report and abort.

use backtrace::Backtrace;

use crate::util::formatted_size;

#[cold]
fn abort_with_backtrace() -> ! {
    eprintln!("{:?}", Backtrace::new());
    std::process::abort()
}

#[cold]
pub fn segment_oom(size: usize) -> ! {
    eprintln!(
        "Out of memory while allocating evacuation failure log segment of {}",
        formatted_size(size)
    );
    abort_with_backtrace()
}

#[cold]
pub fn capacity_exhausted(segment: usize, max_segments: usize, length: usize) -> ! {
    eprintln!(
        "Evacuation failure log overflow: segment {} requested but only {} segments of {} elements are available",
        segment, max_segments, length
    );
    abort_with_backtrace()
}

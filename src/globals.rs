use std::mem::size_of;

/// Number of offsets held by one segment of a region's failure log.
pub const SEGMENT_LENGTH: usize = 256;
pub const HEAP_WORD_SIZE: usize = size_of::<usize>();
pub const LOG_HEAP_WORD_SIZE: usize = HEAP_WORD_SIZE.trailing_zeros() as usize;
/// Alignment `malloc` guarantees for any request.
pub const MALLOC_ALIGNMENT: usize = 2 * size_of::<usize>();

pub const MIN_REGION_SIZE: usize = 256 * 1024;
pub const MAX_REGION_SIZE: usize = 32 * 1024 * 1024;
pub const MIN_NUM_REGIONS: usize = 10;
pub const DEFAULT_TARGET_NUM_REGIONS: usize = 2048;
pub const PAGE_SIZE: usize = 4096;

/// Released segments kept around by a `SegmentPool` when nothing else is configured.
pub const DEFAULT_POOL_SEGMENTS: usize = 64;

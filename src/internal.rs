pub mod cursor;
pub mod segment;
pub mod segment_allocator;

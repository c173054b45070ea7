use crate::{
    globals::{
        DEFAULT_TARGET_NUM_REGIONS, HEAP_WORD_SIZE, LOG_HEAP_WORD_SIZE, MAX_REGION_SIZE,
        MIN_NUM_REGIONS, MIN_REGION_SIZE, PAGE_SIZE, SEGMENT_LENGTH,
    },
    util::{align_up, formatted_size, round_down_to_power_of_two, which_power_of_two},
};

/// Sizes shared by every region of the heap, and the failure log dimensions they imply.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct RegionGeometry {
    pub region_size_bytes: usize,
    pub region_size_words: usize,
    pub region_size_bytes_shift: usize,
    pub region_size_words_shift: usize,
    pub region_count: usize,
    /// Largest word offset an object inside a region can have.
    pub offset_mask: u64,
    /// Segments needed for one record per heap word of a region.
    pub max_segments: usize,
}

impl std::fmt::Debug for RegionGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "RegionGeometry:")?;
        writeln!(
            f,
            "\tregion_size_bytes: {}",
            formatted_size(self.region_size_bytes)
        )?;
        writeln!(f, "\tregion_size_words: {}", self.region_size_words)?;
        writeln!(
            f,
            "\tregion_size_bytes_shift: {}",
            self.region_size_bytes_shift
        )?;
        writeln!(
            f,
            "\tregion_size_words_shift: {}",
            self.region_size_words_shift
        )?;
        writeln!(f, "\tregion_count: {}", self.region_count)?;
        writeln!(f, "\toffset_mask: {:#x}", self.offset_mask)?;
        writeln!(f, "\tmax_segments: {}", self.max_segments)
    }
}

impl RegionGeometry {
    /// Geometry for `region_count` regions of exactly `region_size_bytes` each.
    pub fn new(region_size_bytes: usize, region_count: usize) -> Self {
        if !region_size_bytes.is_power_of_two() || region_size_bytes < HEAP_WORD_SIZE {
            panic!(
                "Region size ({} bytes) must be a power of two of at least one heap word",
                region_size_bytes
            );
        }
        let region_size_words = region_size_bytes >> LOG_HEAP_WORD_SIZE;
        if region_size_words as u64 > u32::MAX as u64 + 1 {
            panic!(
                "Region size ({}) is too large for 32-bit word offsets",
                formatted_size(region_size_bytes)
            );
        }
        assert!(region_count > 0, "a heap needs at least one region");

        let region_size_bytes_shift = which_power_of_two(region_size_bytes);
        let region_size_words_shift = region_size_bytes_shift - LOG_HEAP_WORD_SIZE;
        Self {
            region_size_bytes,
            region_size_words,
            region_size_bytes_shift,
            region_size_words_shift,
            region_count,
            offset_mask: (1u64 << region_size_words_shift) - 1,
            max_segments: region_size_words / SEGMENT_LENGTH + 1,
        }
    }

    /// Picks a region size for a heap of `max_heap_size` bytes aiming at
    /// `target_num_regions` regions, clamped to the region size limits.
    pub fn setup_sizes(
        max_heap_size: usize,
        min_region_size: Option<usize>,
        target_num_regions: Option<usize>,
        max_region_size: Option<usize>,
    ) -> Self {
        let min_region_size = min_region_size
            .map(|x| x.max(MIN_REGION_SIZE))
            .unwrap_or(MIN_REGION_SIZE);
        let target_num_regions = target_num_regions.unwrap_or(DEFAULT_TARGET_NUM_REGIONS);
        let max_region_size = max_region_size.unwrap_or(MAX_REGION_SIZE);
        if min_region_size > max_heap_size / MIN_NUM_REGIONS {
            panic!("Max heap size ({}) is too low to afford the minimum number of regions ({}) of minimum region size ({})",
                formatted_size(max_heap_size), MIN_NUM_REGIONS, formatted_size(min_region_size)
            );
        }

        let mut region_size = max_heap_size / target_num_regions.max(1);
        region_size = region_size.max(min_region_size);
        region_size = max_region_size.min(region_size);
        region_size = align_up(region_size, PAGE_SIZE);
        region_size = round_down_to_power_of_two(region_size);

        let max_heap_size = align_up(max_heap_size, PAGE_SIZE);
        let region_count = align_up(max_heap_size, region_size) / region_size;
        Self::new(region_size, region_count)
    }

    /// Address of the first word of region `index` in a heap starting at `heap_base`.
    #[inline]
    pub fn region_bottom(&self, heap_base: *mut u8, index: usize) -> *mut u8 {
        debug_assert!(index < self.region_count);
        heap_base.wrapping_add(index << self.region_size_bytes_shift)
    }

    #[inline]
    pub fn region_index_for(&self, heap_base: *const u8, addr: *const u8) -> usize {
        debug_assert!(addr >= heap_base);
        (addr as usize - heap_base as usize) >> self.region_size_bytes_shift
    }

    pub fn heap_size(&self) -> usize {
        self.region_count << self.region_size_bytes_shift
    }
}

#[inline(always)]
pub const fn align_down(addr: usize, align: usize) -> usize {
    addr & !align.wrapping_sub(1)
}
#[inline(always)]
pub const fn align_up(addr: usize, align: usize) -> usize {
    align_down(addr.wrapping_add(align.wrapping_sub(1)), align)
}
#[inline(always)]
pub const fn is_aligned(addr: usize, align: usize) -> bool {
    addr & align.wrapping_sub(1) == 0
}

/// A `SIZE` bits wide field stored at bit `SHIFT` of a 64-bit word.
pub trait BitFieldTrait<const SHIFT: u64, const SIZE: u64> {
    // `1 << 64` is not representable, so the upper bound wraps to zero for fields
    // ending at the top bit.
    const MASK: u64 = (1u64 << SHIFT)
        .wrapping_shl(SIZE as u32)
        .wrapping_sub(1u64 << SHIFT);
    const MAX: u64 = Self::MASK >> SHIFT;

    fn encode(value: u64) -> u64 {
        debug_assert!(value <= Self::MAX);
        value.wrapping_shl(SHIFT as _)
    }
    fn update(previous: u64, value: u64) -> u64 {
        (previous & !Self::MASK) | Self::encode(value)
    }

    fn decode(value: u64) -> u64 {
        (value & Self::MASK).wrapping_shr(SHIFT as _)
    }
}

#[inline]
pub fn which_power_of_two(value: usize) -> usize {
    debug_assert!(value.is_power_of_two());
    value.trailing_zeros() as _
}

pub fn round_down_to_power_of_two(value: usize) -> usize {
    if value == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - value.leading_zeros())
}

/// Byte count printed with a binary unit suffix: `512B`, `1.5K`, `32.0M`, `2.0G`.
pub struct FormattedSize {
    pub size: usize,
}

impl std::fmt::Display for FormattedSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let ksize = (self.size as f64) / 1024f64;

        if ksize < 1f64 {
            return write!(f, "{}B", self.size);
        }

        let msize = ksize / 1024f64;

        if msize < 1f64 {
            return write!(f, "{:.1}K", ksize);
        }

        let gsize = msize / 1024f64;

        if gsize < 1f64 {
            write!(f, "{:.1}M", msize)
        } else {
            write!(f, "{:.1}G", gsize)
        }
    }
}

/// Wraps `size` (in bytes) for display in diagnostics and statistics.
pub fn formatted_size(size: usize) -> FormattedSize {
    FormattedSize { size }
}

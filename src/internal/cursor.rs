use crate::util::BitFieldTrait;

pub struct SlotField;
pub struct SegmentField;

impl BitFieldTrait<0, 32> for SlotField {}
impl BitFieldTrait<32, 32> for SegmentField {}

/// Next free `(segment, slot)` coordinate of a segmented log packed into one word,
/// so that a single compare-and-swap reserves both halves together.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[repr(transparent)]
pub struct Cursor(u64);

impl Cursor {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn new(segment: u32, slot: u32) -> Self {
        Self(SegmentField::encode(segment as u64) | SlotField::encode(slot as u64))
    }

    #[inline]
    pub fn segment(self) -> usize {
        SegmentField::decode(self.0) as usize
    }

    #[inline]
    pub fn slot(self) -> usize {
        SlotField::decode(self.0) as usize
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Successor coordinate in a log whose segments hold `len` slots.
    #[inline]
    pub fn next(self, len: usize) -> Self {
        let slot = self.slot();
        let segment = self.segment();
        debug_assert!(slot < len && len as u64 <= SlotField::MAX);
        debug_assert!((segment as u64) < SegmentField::MAX);
        if slot + 1 == len {
            Self::new(segment as u32 + 1, 0)
        } else {
            Self(SlotField::update(self.0, slot as u64 + 1))
        }
    }

    /// Number of elements reserved before this coordinate.
    #[inline]
    pub fn reserved(self, len: usize) -> usize {
        self.segment() * len + self.slot()
    }
}

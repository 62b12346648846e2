//! Growable bit vector for categorical split membership.

/// Bits per storage slot.
pub const SLOT_BITS: usize = 32;

/// Per-tree bit vector recording which categories take the true branch.
///
/// Each categorical criterion owns `cardinality` consecutive bits starting at
/// its offset. The vector only grows; storage is rounded up to whole `u32`
/// slots and grows geometrically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitBits {
    slots: Vec<u32>,
    n_bit: usize,
}

impl SplitBits {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots needed to hold `n_bit` bits.
    #[inline]
    pub fn slot_count(n_bit: usize) -> usize {
        n_bit.div_ceil(SLOT_BITS)
    }

    /// Rebuild from stored slots.
    pub fn from_slots(slots: Vec<u32>, n_bit: usize) -> Self {
        debug_assert!(Self::slot_count(n_bit) <= slots.len());
        Self { slots, n_bit }
    }

    /// Logical length in bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_bit
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_bit == 0
    }

    /// Grows to at least `n_bit` bits. Never shrinks.
    pub fn resize(&mut self, n_bit: usize) {
        if n_bit <= self.n_bit {
            return;
        }
        let needed = Self::slot_count(n_bit);
        if needed > self.slots.len() {
            let grown = needed.max(2 * self.slots.len());
            self.slots.resize(grown, 0);
        }
        self.n_bit = n_bit;
    }

    #[inline]
    pub fn set_bit(&mut self, pos: usize) {
        debug_assert!(pos < self.n_bit, "bit {} beyond length {}", pos, self.n_bit);
        self.slots[pos / SLOT_BITS] |= 1 << (pos % SLOT_BITS);
    }

    /// Bit at `pos`; positions beyond the length read as unset.
    #[inline]
    pub fn test_bit(&self, pos: usize) -> bool {
        pos < self.n_bit && (self.slots[pos / SLOT_BITS] >> (pos % SLOT_BITS)) & 1 != 0
    }

    /// Slots covering the first `bit_end` bits.
    #[inline]
    pub fn aligned_slots(&self, bit_end: usize) -> &[u32] {
        &self.slots[..Self::slot_count(bit_end.min(self.n_bit))]
    }

    /// Positions of set bits in `range`.
    pub fn ones_in(&self, range: std::ops::Range<usize>) -> impl Iterator<Item = usize> + '_ {
        range.filter(move |&pos| self.test_bit(pos))
    }
}

//! Fixed-width bitsets used for field readiness and row visibility.

use bit_vec::BitVec;

/// One bit per schema field offset.
///
/// Readiness of a segment and the field set a plan touches are both
/// expressed with this type so the readiness gate is a single set
/// difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBitset {
    bits: BitVec,
}

impl FieldBitset {
    /// Create a bitset of `len` cleared bits.
    pub fn new(len: usize) -> Self {
        FieldBitset {
            bits: BitVec::from_elem(len, false),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn set(&mut self, index: usize, value: bool) {
        self.bits.set(index, value);
    }

    pub fn test(&self, index: usize) -> bool {
        self.bits.get(index).unwrap_or(false)
    }

    pub fn any(&self) -> bool {
        self.bits.any()
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|bit| *bit).count()
    }

    /// Bits set in `self` and clear in `other`.
    ///
    /// Both sets must have the same width.
    pub fn difference(&self, other: &FieldBitset) -> FieldBitset {
        assert_eq!(
            self.len(),
            other.len(),
            "bitset width mismatch: {} vs {}",
            self.len(),
            other.len()
        );
        let mut bits = self.bits.clone();
        bits.difference(&other.bits);
        FieldBitset { bits }
    }

    /// Position of the lowest set bit, scanning whole blocks at a time.
    pub fn first_set(&self) -> Option<usize> {
        let block_bits = u32::BITS as usize;
        self.bits
            .blocks()
            .enumerate()
            .find(|(_, block)| *block != 0)
            .map(|(i, block)| i * block_bits + block.trailing_zeros() as usize)
            .filter(|index| *index < self.len())
    }

    /// Iterate over positions of set bits in ascending order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, bit)| bit.then_some(i))
    }
}

/// Per-row visibility filter consumed by vector search.
///
/// A set bit EXCLUDES the row (deleted or filtered out). An empty view
/// excludes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitsetView {
    excluded: BitVec,
}

impl BitsetView {
    /// A view that excludes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an existing exclusion bitmap.
    pub fn from_bits(excluded: BitVec) -> Self {
        BitsetView { excluded }
    }

    /// Build a view of `len` rows excluding the listed rows.
    pub fn from_excluded_rows(len: usize, rows: &[usize]) -> Self {
        let mut excluded = BitVec::from_elem(len, false);
        for &row in rows {
            if row < len {
                excluded.set(row, true);
            }
        }
        BitsetView { excluded }
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    /// Whether `row` must not appear in results.
    pub fn is_excluded(&self, row: usize) -> bool {
        self.excluded.get(row).unwrap_or(false)
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.iter().filter(|bit| *bit).count()
    }
}

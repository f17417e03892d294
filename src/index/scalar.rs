//! Scalar index capability and a sorted-array implementation.

use std::any::Any;
use std::ops::Bound;

use bit_vec::BitVec;

use crate::error::{Result, SegcoreError};
use crate::schema::DataType;
use crate::storage::FieldData;

/// Capability set of a scalar index loaded into a segment.
///
/// Predicates return one bit per row, set for matching rows.
pub trait ScalarIndex: Send + Sync + std::fmt::Debug {
    /// Short name of the index algorithm.
    fn index_type(&self) -> &str;

    /// Column type the index was built over.
    fn data_type(&self) -> DataType;

    /// Number of rows the index was built over.
    fn row_count(&self) -> usize;

    /// Resident size in bytes.
    fn memory_usage(&self) -> usize;

    /// Rows whose value is one of `values`.
    fn in_terms(&self, values: &[i64]) -> BitVec;

    /// Rows whose value lies within the bounds.
    fn range(&self, lower: Bound<i64>, upper: Bound<i64>) -> BitVec;

    /// Value stored at `row`, if the index keeps enough to recover it.
    fn reverse_lookup(&self, row: usize) -> Option<i64>;

    /// Cast to Any for downcasting to concrete types.
    fn as_any(&self) -> &dyn Any;
}

/// Int64 index over `(value, row)` pairs sorted by value.
#[derive(Debug, Clone)]
pub struct SortedScalarIndex {
    sorted: Vec<(i64, u32)>,
    /// Position in `sorted` of each row.
    positions: Vec<u32>,
}

impl SortedScalarIndex {
    /// Build an index over values in row order.
    pub fn build(values: &[i64]) -> Result<Self> {
        if values.len() > u32::MAX as usize {
            return Err(SegcoreError::index(format!(
                "{} rows exceed the sorted index capacity",
                values.len()
            )));
        }

        let mut sorted: Vec<(i64, u32)> = values
            .iter()
            .enumerate()
            .map(|(row, value)| (*value, row as u32))
            .collect();
        sorted.sort_unstable();

        let mut positions = vec![0u32; values.len()];
        for (position, (_, row)) in sorted.iter().enumerate() {
            positions[*row as usize] = position as u32;
        }

        Ok(SortedScalarIndex { sorted, positions })
    }

    /// Build an index from a loaded Int64 column.
    pub fn from_field_data(field_data: &FieldData) -> Result<Self> {
        if field_data.data_type() != DataType::Int64 {
            return Err(SegcoreError::index(format!(
                "sorted index needs an int64 column, got {}",
                field_data.data_type().name()
            )));
        }
        let values: Vec<i64> = (0..field_data.row_count())
            .map(|row| field_data.value(row))
            .collect();
        Self::build(&values)
    }

    fn lower_position(&self, bound: Bound<i64>) -> usize {
        match bound {
            Bound::Included(v) => self.sorted.partition_point(|(value, _)| *value < v),
            Bound::Excluded(v) => self.sorted.partition_point(|(value, _)| *value <= v),
            Bound::Unbounded => 0,
        }
    }

    fn upper_position(&self, bound: Bound<i64>) -> usize {
        match bound {
            Bound::Included(v) => self.sorted.partition_point(|(value, _)| *value <= v),
            Bound::Excluded(v) => self.sorted.partition_point(|(value, _)| *value < v),
            Bound::Unbounded => self.sorted.len(),
        }
    }
}

impl ScalarIndex for SortedScalarIndex {
    fn index_type(&self) -> &str {
        "SORTED"
    }

    fn data_type(&self) -> DataType {
        DataType::Int64
    }

    fn row_count(&self) -> usize {
        self.sorted.len()
    }

    fn memory_usage(&self) -> usize {
        self.sorted.len() * std::mem::size_of::<(i64, u32)>()
            + self.positions.len() * std::mem::size_of::<u32>()
    }

    fn in_terms(&self, values: &[i64]) -> BitVec {
        let mut bits = BitVec::from_elem(self.row_count(), false);
        for value in values {
            let start = self.lower_position(Bound::Included(*value));
            let end = self.upper_position(Bound::Included(*value));
            for (_, row) in &self.sorted[start..end] {
                bits.set(*row as usize, true);
            }
        }
        bits
    }

    fn range(&self, lower: Bound<i64>, upper: Bound<i64>) -> BitVec {
        let mut bits = BitVec::from_elem(self.row_count(), false);
        let start = self.lower_position(lower);
        let end = self.upper_position(upper);
        if start < end {
            for (_, row) in &self.sorted[start..end] {
                bits.set(*row as usize, true);
            }
        }
        bits
    }

    fn reverse_lookup(&self, row: usize) -> Option<i64> {
        self.positions
            .get(row)
            .map(|position| self.sorted[*position as usize].0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

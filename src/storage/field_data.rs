//! Raw column buffers and the scatter-gather over them.
//!
//! A [`FieldData`] owns one column's little-endian bytes exactly as the
//! loader handed them over. Reads decode values in place with `byteorder`
//! and never copy the buffer.

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegcoreError};
use crate::schema::{DataType, FieldMeta};

/// A reference to a row of a segment that may be absent.
///
/// Upstream query layers mark rows excluded by a filter with
/// [`SegOffset::NONE`] (raw value `-1`). Gathers write the element type's
/// sentinel for such slots instead of reading the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegOffset(i64);

impl SegOffset {
    /// The "no such row" reference.
    pub const NONE: SegOffset = SegOffset(-1);

    pub fn new(row: usize) -> Self {
        SegOffset(row as i64)
    }

    pub fn from_raw(raw: i64) -> Self {
        SegOffset(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    /// Negative raw values never address a row.
    pub fn is_none(self) -> bool {
        self.0 < 0
    }

    pub fn get(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl From<i64> for SegOffset {
    fn from(raw: i64) -> Self {
        SegOffset(raw)
    }
}

impl From<usize> for SegOffset {
    fn from(row: usize) -> Self {
        SegOffset::new(row)
    }
}

/// Scalar element types that can be gathered out of a column.
pub trait GatherScalar: Copy + Send + Sync + 'static {
    /// Column type this element is stored as.
    const DATA_TYPE: DataType;

    /// Value written for absent rows.
    const SENTINEL: Self;

    /// Decode one element from exactly `DATA_TYPE.element_size()` bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Convert a value recovered from a scalar index, which keys on i64.
    fn from_index_value(value: i64) -> Self;
}

impl GatherScalar for bool {
    const DATA_TYPE: DataType = DataType::Bool;
    const SENTINEL: Self = false;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn from_index_value(value: i64) -> Self {
        value != 0
    }
}

impl GatherScalar for i8 {
    const DATA_TYPE: DataType = DataType::Int8;
    const SENTINEL: Self = -1;

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn from_index_value(value: i64) -> Self {
        value as i8
    }
}

macro_rules! impl_gather_scalar {
    ($ty:ty, $data_type:expr, $sentinel:expr, $read:ident) => {
        impl GatherScalar for $ty {
            const DATA_TYPE: DataType = $data_type;
            const SENTINEL: Self = $sentinel;

            fn decode(bytes: &[u8]) -> Self {
                LittleEndian::$read(bytes)
            }

            fn from_index_value(value: i64) -> Self {
                value as $ty
            }
        }
    };
}

impl_gather_scalar!(i16, DataType::Int16, -1, read_i16);
impl_gather_scalar!(i32, DataType::Int32, -1, read_i32);
impl_gather_scalar!(i64, DataType::Int64, -1, read_i64);
impl_gather_scalar!(f32, DataType::Float, f32::NAN, read_f32);
impl_gather_scalar!(f64, DataType::Double, f64::NAN, read_f64);

/// Calculate `output[i] = read(seg_offsets[i])`, writing `T::SENTINEL` for
/// absent rows.
///
/// Runs on the rayon pool when there are at least `parallel_threshold`
/// offsets.
pub fn gather_into<T, F>(
    seg_offsets: &[SegOffset],
    output: &mut [T],
    parallel_threshold: usize,
    read: F,
) where
    T: GatherScalar,
    F: Fn(usize) -> T + Sync,
{
    assert_eq!(
        seg_offsets.len(),
        output.len(),
        "gather output holds {} slots for {} offsets",
        output.len(),
        seg_offsets.len()
    );

    let fill = |(dst, offset): (&mut T, &SegOffset)| {
        *dst = match offset.get() {
            Some(row) => read(row),
            None => T::SENTINEL,
        };
    };

    if seg_offsets.len() >= parallel_threshold {
        output
            .par_iter_mut()
            .zip(seg_offsets.par_iter())
            .for_each(fill);
    } else {
        output.iter_mut().zip(seg_offsets.iter()).for_each(fill);
    }
}

/// One loaded column.
#[derive(Debug, Clone)]
pub struct FieldData {
    data_type: DataType,
    size_per_row: usize,
    row_count: usize,
    size_per_chunk: usize,
    bytes: Vec<u8>,
}

impl FieldData {
    /// Wrap a raw buffer for the field described by `meta`.
    ///
    /// The buffer must hold exactly `row_count` rows. The result is a single
    /// chunk spanning every row.
    pub fn new(meta: &FieldMeta, row_count: usize, bytes: Vec<u8>) -> Result<Self> {
        let size_per_row = meta.size_per_row();
        let expected = row_count
            .checked_mul(size_per_row)
            .ok_or_else(|| SegcoreError::field(format!("row count {row_count} overflows")))?;
        if bytes.len() != expected {
            return Err(SegcoreError::field(format!(
                "field '{}' buffer holds {} bytes, expected {} ({} rows of {} bytes)",
                meta.name(),
                bytes.len(),
                expected,
                row_count,
                size_per_row
            )));
        }

        Ok(FieldData {
            data_type: meta.data_type(),
            size_per_row,
            row_count,
            size_per_chunk: row_count,
            bytes,
        })
    }

    /// Split the column into chunks of `size_per_chunk` rows.
    pub fn with_size_per_chunk(mut self, size_per_chunk: usize) -> Result<Self> {
        if size_per_chunk == 0 {
            return Err(SegcoreError::invalid_argument(
                "size_per_chunk must be positive",
            ));
        }
        self.size_per_chunk = size_per_chunk;
        Ok(self)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn size_per_row(&self) -> usize {
        self.size_per_row
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Resident size of the buffer.
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Nominal rows per chunk; the last chunk may be shorter.
    pub fn size_per_chunk(&self) -> usize {
        self.size_per_chunk
    }

    pub fn num_chunk(&self) -> usize {
        if self.row_count == 0 {
            1
        } else {
            self.row_count.div_ceil(self.size_per_chunk.max(1))
        }
    }

    /// Borrow the rows of one chunk.
    pub fn chunk(&self, chunk_id: usize) -> Option<Span<'_>> {
        if chunk_id >= self.num_chunk() {
            return None;
        }
        let first = chunk_id * self.size_per_chunk;
        let rows = self.size_per_chunk.min(self.row_count - first.min(self.row_count));
        let start = first * self.size_per_row;
        let end = start + rows * self.size_per_row;
        Some(Span {
            data: &self.bytes[start..end],
            row_count: rows,
            size_per_row: self.size_per_row,
            data_type: self.data_type,
        })
    }

    /// Decode the value at `row`.
    ///
    /// Panics if `row` is out of range or `T` does not match the column type.
    pub fn value<T: GatherScalar>(&self, row: usize) -> T {
        assert_eq!(
            T::DATA_TYPE,
            self.data_type,
            "column of type {} read as {}",
            self.data_type.name(),
            T::DATA_TYPE.name()
        );
        assert!(
            row < self.row_count,
            "row {row} out of range for column of {} rows",
            self.row_count
        );
        let start = row * self.size_per_row;
        T::decode(&self.bytes[start..start + self.size_per_row])
    }

    /// Decode a float vector column into owned rows, `dim` values each.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        if self.data_type != DataType::VectorFloat && self.data_type != DataType::Float {
            return Err(SegcoreError::field(format!(
                "cannot decode {} column as f32",
                self.data_type.name()
            )));
        }
        let mut out = vec![0.0f32; self.bytes.len() / 4];
        LittleEndian::read_f32_into(&self.bytes, &mut out);
        Ok(out)
    }
}

/// A borrowed, read-only view of one chunk of a column.
#[derive(Debug, Clone, Copy)]
pub struct Span<'a> {
    data: &'a [u8],
    row_count: usize,
    size_per_row: usize,
    data_type: DataType,
}

impl<'a> Span<'a> {
    pub(crate) fn from_parts(
        data: &'a [u8],
        row_count: usize,
        size_per_row: usize,
        data_type: DataType,
    ) -> Self {
        Span {
            data,
            row_count,
            size_per_row,
            data_type,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn size_per_row(&self) -> usize {
        self.size_per_row
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Raw bytes of one row within this chunk.
    pub fn row_bytes(&self, row: usize) -> Option<&'a [u8]> {
        if row >= self.row_count {
            return None;
        }
        let start = row * self.size_per_row;
        Some(&self.data[start..start + self.size_per_row])
    }

    /// Decode one scalar value of this chunk.
    pub fn get<T: GatherScalar>(&self, row: usize) -> Option<T> {
        if T::DATA_TYPE != self.data_type {
            return None;
        }
        self.row_bytes(row).map(T::decode)
    }

    /// Iterate decoded scalar values of this chunk.
    pub fn iter<T: GatherScalar>(&self) -> impl Iterator<Item = T> + 'a {
        let matches = T::DATA_TYPE == self.data_type;
        let size = self.size_per_row.max(1);
        let data: &'a [u8] = if matches { self.data } else { &[] };
        data.chunks_exact(size).map(T::decode)
    }
}

/// Encode values as a little-endian column buffer.
pub fn encode_i64s(values: &[i64]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len() * 8];
    LittleEndian::write_i64_into(values, &mut bytes);
    bytes
}

/// Encode values as a little-endian column buffer.
pub fn encode_f32s(values: &[f32]) -> Vec<u8> {
    let mut bytes = vec![0u8; values.len() * 4];
    LittleEndian::write_f32_into(values, &mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MetricType;
    use crate::schema::FieldId;

    fn int64_meta() -> FieldMeta {
        FieldMeta::scalar(FieldId(101), "age", DataType::Int64).unwrap()
    }

    fn column(values: &[i64]) -> FieldData {
        FieldData::new(&int64_meta(), values.len(), encode_i64s(values)).unwrap()
    }

    #[test]
    fn test_seg_offset() {
        assert!(SegOffset::NONE.is_none());
        assert_eq!(SegOffset::NONE.get(), None);
        assert_eq!(SegOffset::from(3i64).get(), Some(3));
        assert_eq!(SegOffset::new(7).raw(), 7);
    }

    #[test]
    fn test_gather_with_sentinel() {
        let data = column(&[10, 20, 30, 40]);
        let offsets: Vec<SegOffset> = [-1i64, 2, -1, 0].into_iter().map(SegOffset::from).collect();
        let mut output = vec![0i64; offsets.len()];
        gather_into(&offsets, &mut output, usize::MAX, |row| data.value(row));
        assert_eq!(output, vec![-1, 30, -1, 10]);
    }

    #[test]
    fn test_parallel_gather_matches_serial() {
        let values: Vec<i64> = (0..1000).map(|v| v * 3).collect();
        let data = column(&values);
        let offsets: Vec<SegOffset> = (0..1000)
            .map(|i| {
                if i % 7 == 0 {
                    SegOffset::NONE
                } else {
                    SegOffset::new(999 - i)
                }
            })
            .collect();

        let mut serial = vec![0i64; offsets.len()];
        gather_into(&offsets, &mut serial, usize::MAX, |row| data.value(row));
        let mut parallel = vec![0i64; offsets.len()];
        gather_into(&offsets, &mut parallel, 0, |row| data.value(row));
        assert_eq!(serial, parallel);
        assert_eq!(serial[0], -1);
        assert_eq!(serial[1], 998 * 3);
    }

    #[test]
    fn test_float_sentinel_is_nan() {
        let meta = FieldMeta::scalar(FieldId(1), "score", DataType::Float).unwrap();
        let data = FieldData::new(&meta, 2, encode_f32s(&[0.5, 1.5])).unwrap();
        let offsets = [SegOffset::new(1), SegOffset::NONE];
        let mut output = vec![0.0f32; 2];
        gather_into(&offsets, &mut output, usize::MAX, |row| data.value(row));
        assert_eq!(output[0], 1.5);
        assert!(output[1].is_nan());
    }

    #[test]
    fn test_buffer_size_validated() {
        let result = FieldData::new(&int64_meta(), 3, vec![0u8; 16]);
        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "read as")]
    fn test_type_mismatch_panics() {
        let data = column(&[1]);
        let _: i32 = data.value(0);
    }

    #[test]
    fn test_single_chunk_span() {
        let data = column(&[10, 20, 30, 40]);
        assert_eq!(data.num_chunk(), 1);
        assert_eq!(data.size_per_chunk(), 4);
        let span = data.chunk(0).unwrap();
        assert_eq!(span.row_count(), 4);
        assert_eq!(span.data().len(), 32);
        assert_eq!(span.get::<i64>(2), Some(30));
        assert_eq!(span.get::<i32>(2), None);
        assert!(data.chunk(1).is_none());
    }

    #[test]
    fn test_multi_chunk_spans() {
        let data = column(&[1, 2, 3, 4, 5]).with_size_per_chunk(2).unwrap();
        assert_eq!(data.num_chunk(), 3);
        let chunks: Vec<Vec<i64>> = (0..data.num_chunk())
            .map(|c| data.chunk(c).unwrap().iter::<i64>().collect())
            .collect();
        assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
        assert!(column(&[1]).with_size_per_chunk(0).is_err());
    }

    #[test]
    fn test_vector_column_decode() {
        let meta =
            FieldMeta::vector(FieldId(2), "v", DataType::VectorFloat, 2, MetricType::L2).unwrap();
        let data = FieldData::new(&meta, 2, encode_f32s(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(data.size_per_row(), 8);
        assert_eq!(data.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(data.chunk(0).unwrap().row_bytes(1).unwrap().len(), 8);
    }
}

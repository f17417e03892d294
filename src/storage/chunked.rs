//! Per-field chunked column storage of a segment.

use crate::schema::FieldOffset;
use crate::storage::field_data::{FieldData, Span};

/// Raw column buffers of a segment, addressed by field offset.
///
/// Every accessor is chunk-indexed even though a sealed segment keeps each
/// column as a single chunk.
#[derive(Debug, Default)]
pub struct ChunkedFieldStore {
    columns: Vec<Option<FieldData>>,
}

impl ChunkedFieldStore {
    /// Create an empty store with one slot per schema field.
    pub fn new(num_fields: usize) -> Self {
        ChunkedFieldStore {
            columns: (0..num_fields).map(|_| None).collect(),
        }
    }

    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    /// Install a column, returning the one it replaced.
    pub fn install(&mut self, offset: FieldOffset, data: FieldData) -> Option<FieldData> {
        self.columns[offset.get()].replace(data)
    }

    /// Remove and return a column.
    pub fn take(&mut self, offset: FieldOffset) -> Option<FieldData> {
        self.columns.get_mut(offset.get()).and_then(Option::take)
    }

    pub fn get(&self, offset: FieldOffset) -> Option<&FieldData> {
        self.columns.get(offset.get()).and_then(Option::as_ref)
    }

    /// Whether a field holds a non-empty column.
    pub fn is_loaded(&self, offset: FieldOffset) -> bool {
        self.get(offset).is_some_and(|data| !data.is_empty())
    }

    /// Number of chunks of a field, zero when nothing is loaded.
    pub fn num_chunk(&self, offset: FieldOffset) -> usize {
        self.get(offset).map_or(0, FieldData::num_chunk)
    }

    pub fn size_per_chunk(&self, offset: FieldOffset) -> Option<usize> {
        self.get(offset).map(FieldData::size_per_chunk)
    }

    /// Borrow one chunk of a field.
    pub fn chunk_data(&self, offset: FieldOffset, chunk_id: usize) -> Option<Span<'_>> {
        self.get(offset).and_then(|data| data.chunk(chunk_id))
    }

    /// Total bytes held by all loaded columns.
    pub fn memory_usage(&self) -> usize {
        self.columns.iter().flatten().map(FieldData::byte_size).sum()
    }

    pub fn loaded_count(&self) -> usize {
        self.columns
            .iter()
            .flatten()
            .filter(|data| !data.is_empty())
            .count()
    }
}

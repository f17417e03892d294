//! Registry of vector indexes loaded into a sealed segment.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::index::metric::MetricType;
use crate::index::vector::VectorIndex;
use crate::schema::FieldOffset;

/// One vector index of a field.
#[derive(Debug, Clone)]
pub struct SealedIndexingEntry {
    pub metric: MetricType,
    pub index: Arc<dyn VectorIndex>,
}

/// Vector indexes keyed by field offset.
///
/// A field may carry several indexes, at most one per metric. The first
/// entry of a field is its primary index. A sealed segment keeps each
/// index as a single chunk.
#[derive(Debug, Default)]
pub struct SealedIndexingRecord {
    entries: BTreeMap<FieldOffset, Vec<SealedIndexingEntry>>,
}

impl SealedIndexingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index, returning the one with the same metric it replaced.
    pub fn append(
        &mut self,
        offset: FieldOffset,
        index: Arc<dyn VectorIndex>,
    ) -> Option<Arc<dyn VectorIndex>> {
        let metric = index.metric();
        let field_entries = self.entries.entry(offset).or_default();
        if let Some(entry) = field_entries.iter_mut().find(|e| e.metric == metric) {
            return Some(std::mem::replace(&mut entry.index, index));
        }
        field_entries.push(SealedIndexingEntry { metric, index });
        None
    }

    /// Primary index of a field.
    pub fn get(&self, offset: FieldOffset) -> Option<&SealedIndexingEntry> {
        self.entries.get(&offset).and_then(|entries| entries.first())
    }

    pub fn get_by_metric(
        &self,
        offset: FieldOffset,
        metric: MetricType,
    ) -> Option<&SealedIndexingEntry> {
        self.entries
            .get(&offset)
            .and_then(|entries| entries.iter().find(|e| e.metric == metric))
    }

    pub fn entries(&self, offset: FieldOffset) -> &[SealedIndexingEntry] {
        self.entries.get(&offset).map_or(&[][..], Vec::as_slice)
    }

    /// Index responsible for the rows of `chunk_id`.
    pub fn chunk_index(&self, offset: FieldOffset, chunk_id: usize) -> Option<&Arc<dyn VectorIndex>> {
        if chunk_id >= self.num_chunk_index(offset) {
            return None;
        }
        self.get(offset).map(|entry| &entry.index)
    }

    pub fn num_chunk_index(&self, offset: FieldOffset) -> usize {
        usize::from(self.is_ready(offset))
    }

    pub fn is_ready(&self, offset: FieldOffset) -> bool {
        self.entries
            .get(&offset)
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Remove every index of a field.
    pub fn drop_field(&mut self, offset: FieldOffset) -> Vec<SealedIndexingEntry> {
        self.entries.remove(&offset).unwrap_or_default()
    }

    /// Number of registered indexes across all fields.
    pub fn index_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn memory_usage(&self) -> usize {
        self.entries
            .values()
            .flatten()
            .map(|entry| entry.index.memory_usage())
            .sum()
    }
}

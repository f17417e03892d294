//! Vector index capability and the search input/output types.

use std::any::Any;

use crate::error::{Result, SegcoreError};
use crate::index::metric::MetricType;
use crate::storage::SegOffset;
use crate::util::bitset::BitsetView;

/// A batch of query vectors, row-major, `dim` values per query.
#[derive(Debug, Clone, Copy)]
pub struct SearchDataset<'a> {
    num_queries: usize,
    dim: usize,
    data: &'a [f32],
}

impl<'a> SearchDataset<'a> {
    pub fn new(dim: usize, data: &'a [f32]) -> Result<Self> {
        if dim == 0 {
            return Err(SegcoreError::invalid_argument(
                "query dimension must be positive",
            ));
        }
        if data.is_empty() || data.len() % dim != 0 {
            return Err(SegcoreError::invalid_argument(format!(
                "query data of {} values is not a whole number of {dim}-dimensional vectors",
                data.len()
            )));
        }
        Ok(SearchDataset {
            num_queries: data.len() / dim,
            dim,
            data,
        })
    }

    pub fn num_queries(&self) -> usize {
        self.num_queries
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn query(&self, i: usize) -> &'a [f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
}

/// Top-k results for a batch of queries.
///
/// Slots are row-major, `topk` per query, ascending by distance. Queries
/// with fewer than `topk` visible rows are padded with [`SegOffset::NONE`]
/// and `f32::MAX`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub num_queries: usize,
    pub topk: usize,
    pub seg_offsets: Vec<SegOffset>,
    pub distances: Vec<f32>,
    /// Row ids for `seg_offsets`, filled by the segment after dispatch.
    pub row_ids: Vec<i64>,
}

impl SearchResult {
    /// A result with every slot padded.
    pub fn new(num_queries: usize, topk: usize) -> Self {
        SearchResult {
            num_queries,
            topk,
            seg_offsets: vec![SegOffset::NONE; num_queries * topk],
            distances: vec![f32::MAX; num_queries * topk],
            row_ids: Vec::new(),
        }
    }

    /// Write ranked `(row, distance)` hits of query `q`, at most `topk`.
    pub fn set_query_hits(&mut self, q: usize, hits: &[(usize, f32)]) {
        let base = q * self.topk;
        for (slot, (row, distance)) in hits.iter().take(self.topk).enumerate() {
            self.seg_offsets[base + slot] = SegOffset::new(*row);
            self.distances[base + slot] = *distance;
        }
    }

    /// Non-padded `(offset, distance)` hits of query `q`.
    pub fn query_hits(&self, q: usize) -> impl Iterator<Item = (SegOffset, f32)> + '_ {
        let base = q * self.topk;
        self.seg_offsets[base..base + self.topk]
            .iter()
            .zip(&self.distances[base..base + self.topk])
            .filter(|(offset, _)| !offset.is_none())
            .map(|(offset, distance)| (*offset, *distance))
    }

    /// Row ids of query `q`, in slot order; empty until filled.
    pub fn query_row_ids(&self, q: usize) -> &[i64] {
        if self.row_ids.is_empty() {
            return &[];
        }
        let base = q * self.topk;
        &self.row_ids[base..base + self.topk]
    }
}

/// Capability set of a vector index loaded into a segment.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Short name of the index algorithm.
    fn index_type(&self) -> &str;

    fn metric(&self) -> MetricType;

    fn dimension(&self) -> usize;

    /// Number of rows the index was built over.
    fn row_count(&self) -> usize;

    /// Resident size in bytes.
    fn memory_usage(&self) -> usize;

    /// Search the `topk` nearest rows for every query.
    ///
    /// Rows excluded by `filter` must never appear in the result.
    /// `params` carries index-specific knobs as a JSON object.
    fn search(
        &self,
        dataset: &SearchDataset<'_>,
        topk: usize,
        params: &serde_json::Value,
        filter: &BitsetView,
    ) -> Result<SearchResult>;

    /// Cast to Any for downcasting to concrete types.
    fn as_any(&self) -> &dyn Any;
}

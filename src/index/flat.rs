//! Flat vector index for exact (brute force) search.

use std::any::Any;

use rayon::prelude::*;
use tracing::trace;

use crate::error::{Result, SegcoreError};
use crate::index::metric::MetricType;
use crate::index::vector::{SearchDataset, SearchResult, VectorIndex};
use crate::schema::DataType;
use crate::storage::FieldData;
use crate::util::bitset::BitsetView;

/// Batches with at least this many queries are searched on the rayon pool.
const PARALLEL_QUERY_THRESHOLD: usize = 4;

/// Exact nearest-neighbor index holding every vector in memory.
///
/// Ties on distance are broken by ascending row offset. Rows whose
/// distance is NaN rank last with distance `f32::INFINITY`.
#[derive(Debug, Clone)]
pub struct FlatVectorIndex {
    dim: usize,
    metric: MetricType,
    data: Vec<f32>,
}

impl FlatVectorIndex {
    /// Create an index over row-major vectors of `dim` values.
    pub fn new(dim: usize, metric: MetricType, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(SegcoreError::index("dimension must be positive"));
        }
        if data.len() % dim != 0 {
            return Err(SegcoreError::index(format!(
                "{} values is not a whole number of {dim}-dimensional vectors",
                data.len()
            )));
        }
        Ok(FlatVectorIndex { dim, metric, data })
    }

    /// Build an index from a loaded float vector column.
    pub fn from_field_data(field_data: &FieldData, dim: usize, metric: MetricType) -> Result<Self> {
        if field_data.data_type() != DataType::VectorFloat {
            return Err(SegcoreError::index(format!(
                "flat index needs a vector_float column, got {}",
                field_data.data_type().name()
            )));
        }
        Self::new(dim, metric, field_data.to_f32_vec()?)
    }

    fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.dim..(row + 1) * self.dim]
    }

    fn search_one(&self, query: &[f32], topk: usize, filter: &BitsetView) -> Vec<(usize, f32)> {
        let mut candidates: Vec<(usize, f32)> = (0..self.row_count())
            .filter(|row| !filter.is_excluded(*row))
            .map(|row| {
                let distance = self.metric.distance(query, self.row(row));
                // NaN ranks after every real distance; -0.0 ties with 0.0.
                let distance = if distance.is_nan() {
                    f32::INFINITY
                } else if distance == 0.0 {
                    0.0
                } else {
                    distance
                };
                (row, distance)
            })
            .collect();

        let order = |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));

        if candidates.len() > topk {
            candidates.select_nth_unstable_by(topk, order);
            candidates.truncate(topk);
        }
        candidates.sort_unstable_by(order);
        candidates
    }
}

impl VectorIndex for FlatVectorIndex {
    fn index_type(&self) -> &str {
        "FLAT"
    }

    fn metric(&self) -> MetricType {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn row_count(&self) -> usize {
        self.data.len() / self.dim
    }

    fn memory_usage(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    fn search(
        &self,
        dataset: &SearchDataset<'_>,
        topk: usize,
        params: &serde_json::Value,
        filter: &BitsetView,
    ) -> Result<SearchResult> {
        if dataset.dim() != self.dim {
            return Err(SegcoreError::invalid_argument(format!(
                "query dimension {} does not match index dimension {}",
                dataset.dim(),
                self.dim
            )));
        }
        if topk == 0 {
            return Err(SegcoreError::invalid_argument("topk must be positive"));
        }
        if !(params.is_null() || params.is_object()) {
            return Err(SegcoreError::invalid_argument(
                "search params must be a JSON object",
            ));
        }

        let num_queries = dataset.num_queries();
        let parallel = num_queries >= PARALLEL_QUERY_THRESHOLD;
        trace!(
            target: "segcore.index",
            rows = self.row_count(),
            excluded = filter.excluded_count(),
            num_queries,
            topk,
            parallel,
            "flat search"
        );
        let hits: Vec<Vec<(usize, f32)>> = if parallel {
            (0..num_queries)
                .into_par_iter()
                .map(|q| self.search_one(dataset.query(q), topk, filter))
                .collect()
        } else {
            (0..num_queries)
                .map(|q| self.search_one(dataset.query(q), topk, filter))
                .collect()
        };

        let mut result = SearchResult::new(num_queries, topk);
        for (q, query_hits) in hits.iter().enumerate() {
            result.set_query_hits(q, query_hits);
        }
        Ok(result)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Index capabilities and registries of a sealed segment.
//!
//! Index algorithms are external collaborators: a segment only needs the
//! [`ScalarIndex`] and [`VectorIndex`] capability sets. Two concrete
//! implementations ship with the crate so loaders can build indexes from
//! raw columns: [`SortedScalarIndex`] and the exact [`FlatVectorIndex`].

pub mod flat;
pub mod metric;
pub mod record;
pub mod scalar;
pub mod vector;

use std::sync::Arc;

pub use flat::FlatVectorIndex;
pub use metric::MetricType;
pub use record::{SealedIndexingEntry, SealedIndexingRecord};
pub use scalar::{ScalarIndex, SortedScalarIndex};
pub use vector::{SearchDataset, SearchResult, VectorIndex};

/// An index handle handed to a segment by a loader.
#[derive(Debug, Clone)]
pub enum LoadedIndex {
    Scalar(Arc<dyn ScalarIndex>),
    Vector(Arc<dyn VectorIndex>),
}

impl LoadedIndex {
    pub fn index_type(&self) -> &str {
        match self {
            LoadedIndex::Scalar(index) => index.index_type(),
            LoadedIndex::Vector(index) => index.index_type(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            LoadedIndex::Scalar(index) => index.row_count(),
            LoadedIndex::Vector(index) => index.row_count(),
        }
    }

    pub fn memory_usage(&self) -> usize {
        match self {
            LoadedIndex::Scalar(index) => index.memory_usage(),
            LoadedIndex::Vector(index) => index.memory_usage(),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, LoadedIndex::Vector(_))
    }
}

impl From<FlatVectorIndex> for LoadedIndex {
    fn from(index: FlatVectorIndex) -> Self {
        LoadedIndex::Vector(Arc::new(index))
    }
}

impl From<SortedScalarIndex> for LoadedIndex {
    fn from(index: SortedScalarIndex) -> Self {
        LoadedIndex::Scalar(Arc::new(index))
    }
}

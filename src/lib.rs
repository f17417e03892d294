//! # Segcore
//!
//! Sealed-segment storage and query execution for a column-oriented vector
//! database.
//!
//! ## Features
//!
//! - Field-by-field loading of immutable segments
//! - Readiness tracking with errors naming the missing field
//! - Typed bulk gathers by segment offset
//! - Brute-force vector search with visibility filters
//! - Sorted scalar indexes that can stand in for raw columns

pub mod error;
pub mod index;
pub mod query;
pub mod schema;
pub mod segment;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::error::{Result, SegcoreError};
    pub use crate::index::{
        FlatVectorIndex, LoadedIndex, MetricType, ScalarIndex, SearchDataset, SearchResult,
        SortedScalarIndex, VectorIndex,
    };
    pub use crate::query::{Plan, PlanBuilder, QueryInfo};
    pub use crate::schema::{DataType, FieldId, FieldMeta, FieldOffset, Schema};
    pub use crate::segment::{
        LoadFieldDataInfo, LoadIndexInfo, ROW_ID_FIELD_ID, SealedSegment, SealedSegmentConfig,
        SegmentInterface, SegmentSealed, SystemFieldType,
    };
    pub use crate::storage::SegOffset;
    pub use crate::util::bitset::BitsetView;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

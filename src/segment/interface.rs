//! Read-side and write-side segment traits.
//!
//! Query execution only needs [`SegmentInterface`]. Loaders and capacity
//! managers additionally use [`SegmentSealed`] to install and release
//! column buffers and indexes.

use std::sync::Arc;

use crate::error::Result;
use crate::index::{ScalarIndex, SearchDataset, SearchResult, VectorIndex};
use crate::query::{Plan, QueryInfo};
use crate::schema::{FieldId, FieldOffset, Schema};
use crate::segment::SystemFieldType;
use crate::segment::load_info::{LoadFieldDataInfo, LoadIndexInfo};
use crate::segment::sealed::ChunkView;
use crate::storage::{GatherScalar, SegOffset};
use crate::util::bitset::BitsetView;

/// Query operations of a segment.
pub trait SegmentInterface: Send + Sync {
    fn get_schema(&self) -> &Schema;

    /// Row count established by the first load, `None` before that.
    fn get_row_count(&self) -> Option<usize>;

    /// Bytes held by loaded column buffers, indexes and row ids.
    fn get_memory_usage_in_bytes(&self) -> usize;

    /// Number of chunks every column of the segment is split into.
    fn num_chunk(&self) -> usize;

    /// Nominal rows per chunk.
    fn size_per_chunk(&self) -> usize;

    /// Number of chunk-level vector indexes of a field.
    fn num_chunk_index(&self, offset: FieldOffset) -> usize;

    /// Borrow one chunk of a field's raw column.
    ///
    /// The view holds the segment's read lock; loads and drops wait until
    /// it is released.
    fn chunk_data(&self, offset: FieldOffset, chunk_id: usize) -> Option<ChunkView<'_>>;

    /// Vector index responsible for the rows of one chunk.
    fn chunk_index(&self, offset: FieldOffset, chunk_id: usize) -> Option<Arc<dyn VectorIndex>>;

    fn scalar_index(&self, offset: FieldOffset) -> Option<Arc<dyn ScalarIndex>>;

    fn is_field_ready(&self, offset: FieldOffset) -> bool;

    fn is_system_field_ready(&self) -> bool;

    /// Fail unless the row-id column and every field the plan touches are
    /// ready.
    fn check_search(&self, plan: &Plan) -> Result<()>;

    /// Calculate `output[i] = row_ids[seg_offsets[i]]`, `-1` for absent rows.
    fn bulk_subscript_system_into(
        &self,
        system_type: SystemFieldType,
        seg_offsets: &[SegOffset],
        output: &mut [i64],
    );

    fn bulk_subscript_system(
        &self,
        system_type: SystemFieldType,
        seg_offsets: &[SegOffset],
    ) -> Vec<i64> {
        let mut output = vec![0i64; seg_offsets.len()];
        self.bulk_subscript_system_into(system_type, seg_offsets, &mut output);
        output
    }

    /// Calculate `output[i] = column[seg_offsets[i]]`, `T::SENTINEL` for
    /// absent rows.
    fn bulk_subscript_into<T: GatherScalar>(
        &self,
        offset: FieldOffset,
        seg_offsets: &[SegOffset],
        output: &mut [T],
    ) where
        Self: Sized;

    fn bulk_subscript<T: GatherScalar>(&self, offset: FieldOffset, seg_offsets: &[SegOffset]) -> Vec<T>
    where
        Self: Sized,
    {
        let mut output = vec![T::SENTINEL; seg_offsets.len()];
        self.bulk_subscript_into(offset, seg_offsets, &mut output);
        output
    }

    /// Delegate a nearest-neighbor search to the field's vector index.
    fn vector_search(
        &self,
        query_info: &QueryInfo,
        dataset: &SearchDataset<'_>,
        filter: &BitsetView,
    ) -> Result<SearchResult>;

    /// Resolve the row ids of a search result's offsets.
    fn fill_target_entry(&self, result: &mut SearchResult) {
        result.row_ids = self.bulk_subscript_system(SystemFieldType::RowId, &result.seg_offsets);
    }

    /// Readiness gate, vector search and row-id resolution in one call.
    fn search(
        &self,
        plan: &Plan,
        dataset: &SearchDataset<'_>,
        filter: &BitsetView,
    ) -> Result<SearchResult>;
}

/// Load and drop operations of a sealed segment.
pub trait SegmentSealed: SegmentInterface {
    fn load_field_data(&self, info: LoadFieldDataInfo) -> Result<()>;

    fn load_index(&self, info: LoadIndexInfo) -> Result<()>;

    /// Release a field's raw column. Returns whether anything was loaded.
    fn drop_field_data(&self, field_id: FieldId) -> Result<bool>;

    /// Release every index of a field. Returns whether anything was loaded.
    fn drop_index(&self, field_id: FieldId) -> Result<bool>;
}

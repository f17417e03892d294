//! The sealed segment implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::AHashMap;
use byteorder::{ByteOrder, LittleEndian};
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SegcoreError};
use crate::index::{
    LoadedIndex, ScalarIndex, SealedIndexingRecord, SearchDataset, SearchResult, VectorIndex,
};
use crate::query::{Plan, QueryInfo};
use crate::schema::{DataType, FieldId, FieldOffset, Schema};
use crate::segment::config::SealedSegmentConfig;
use crate::segment::interface::{SegmentInterface, SegmentSealed};
use crate::segment::load_info::{LoadFieldDataInfo, LoadIndexInfo};
use crate::segment::{ROW_ID_FIELD_ID, SystemFieldType};
use crate::storage::{ChunkedFieldStore, FieldData, GatherScalar, SegOffset, Span, gather_into};
use crate::util::bitset::{BitsetView, FieldBitset};

/// Loaded state of a segment, guarded as a whole.
///
/// A field's readiness bit is set iff its column is loaded or an index is
/// registered for it. Every mutation updates the bit in the same critical
/// section as the storage it describes.
#[derive(Debug)]
struct SegmentState {
    row_count: Option<usize>,
    field_ready: FieldBitset,
    field_data: ChunkedFieldStore,
    row_ids: Vec<i64>,
    scalar_indexings: AHashMap<FieldOffset, Arc<dyn ScalarIndex>>,
    vector_indexings: SealedIndexingRecord,
}

impl SegmentState {
    fn new(num_fields: usize) -> Self {
        SegmentState {
            row_count: None,
            field_ready: FieldBitset::new(num_fields),
            field_data: ChunkedFieldStore::new(num_fields),
            row_ids: Vec::new(),
            scalar_indexings: AHashMap::new(),
            vector_indexings: SealedIndexingRecord::new(),
        }
    }

    fn check_row_count(&self, row_count: usize) -> Result<()> {
        match self.row_count {
            Some(expected) if expected != row_count => Err(SegcoreError::InconsistentRowCount {
                expected,
                actual: row_count,
            }),
            _ => Ok(()),
        }
    }

    fn update_row_count(&mut self, row_count: usize) {
        if self.row_count.is_none() {
            self.row_count = Some(row_count);
        }
    }

    fn has_index(&self, offset: FieldOffset) -> bool {
        self.scalar_indexings.contains_key(&offset) || self.vector_indexings.is_ready(offset)
    }

    fn refresh_ready(&mut self, offset: FieldOffset) {
        let ready = self.field_data.is_loaded(offset) || self.has_index(offset);
        self.field_ready.set(offset.get(), ready);
    }

    fn memory_usage(&self) -> usize {
        self.field_data.memory_usage()
            + self
                .scalar_indexings
                .values()
                .map(|index| index.memory_usage())
                .sum::<usize>()
            + self.vector_indexings.memory_usage()
            + self.row_ids.len() * std::mem::size_of::<i64>()
    }
}

/// A borrowed chunk of a field's raw column.
///
/// Holds the segment's read lock for as long as it lives.
#[derive(Debug)]
pub struct ChunkView<'a> {
    data: MappedRwLockReadGuard<'a, [u8]>,
    row_count: usize,
    size_per_row: usize,
    data_type: DataType,
}

impl ChunkView<'_> {
    pub fn span(&self) -> Span<'_> {
        Span::from_parts(&self.data, self.row_count, self.size_per_row, self.data_type)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

/// Point-in-time summary for capacity managers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentStats {
    pub segment_id: u64,
    pub row_count: Option<usize>,
    pub ready_fields: usize,
    pub loaded_columns: usize,
    pub scalar_indexes: usize,
    pub vector_indexes: usize,
    pub system_field_ready: bool,
    pub memory_bytes: usize,
}

/// One immutable partition of a collection, loaded field by field.
///
/// Queries and loads may run concurrently from many threads. Loads and
/// drops of the same field must be serialized by the caller.
#[derive(Debug)]
pub struct SealedSegment {
    config: SealedSegmentConfig,
    schema: Arc<Schema>,
    state: RwLock<SegmentState>,
    /// Exactly one once row ids are published.
    system_ready_count: AtomicUsize,
}

impl SealedSegment {
    /// Create an empty segment: nothing ready, row count unset.
    pub fn new(schema: Arc<Schema>, config: SealedSegmentConfig) -> Result<Self> {
        config.validate()?;
        if schema.get_offset(ROW_ID_FIELD_ID).is_ok() {
            return Err(SegcoreError::schema(format!(
                "Field id {ROW_ID_FIELD_ID} is reserved for the row-id column"
            )));
        }

        let state = SegmentState::new(schema.len());
        Ok(SealedSegment {
            config,
            schema,
            state: RwLock::new(state),
            system_ready_count: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &SealedSegmentConfig {
        &self.config
    }

    pub fn segment_id(&self) -> u64 {
        self.config.segment_id
    }

    pub fn schema_handle(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    pub fn stats(&self) -> SegmentStats {
        let state = self.state.read();
        SegmentStats {
            segment_id: self.config.segment_id,
            row_count: state.row_count,
            ready_fields: state.field_ready.count_ones(),
            loaded_columns: state.field_data.loaded_count(),
            scalar_indexes: state.scalar_indexings.len(),
            vector_indexes: state.vector_indexings.index_count(),
            system_field_ready: self.is_system_field_ready(),
            memory_bytes: state.memory_usage(),
        }
    }

    fn check_search_locked(&self, state: &SegmentState, plan: &Plan) -> Result<()> {
        assert_eq!(
            plan.involved_fields().len(),
            self.schema.len(),
            "plan covers {} fields but the schema has {}",
            plan.involved_fields().len(),
            self.schema.len()
        );

        if !self.is_system_field_ready() {
            warn!(
                target: "segcore.segment",
                segment_id = self.config.segment_id,
                "search rejected: row ids not loaded"
            );
            return Err(SegcoreError::SystemFieldNotLoaded(SystemFieldType::RowId));
        }

        let absent = plan.involved_fields().difference(&state.field_ready);
        if let Some(first) = absent.first_set() {
            let name = self.schema[FieldOffset(first)].name().to_string();
            warn!(
                target: "segcore.segment",
                segment_id = self.config.segment_id,
                field = %name,
                absent = absent.count_ones(),
                "search rejected: field not loaded"
            );
            return Err(SegcoreError::field_not_loaded(name));
        }
        Ok(())
    }

    fn gather_row_ids(&self, state: &SegmentState, seg_offsets: &[SegOffset], output: &mut [i64]) {
        assert!(
            self.is_system_field_ready(),
            "System Field RowID is not loaded"
        );
        let row_ids = &state.row_ids;
        gather_into(
            seg_offsets,
            output,
            self.config.parallel_gather_threshold,
            |row| row_ids[row],
        );
    }

    fn vector_search_locked(
        &self,
        state: &SegmentState,
        query_info: &QueryInfo,
        dataset: &SearchDataset<'_>,
        filter: &BitsetView,
    ) -> Result<SearchResult> {
        let offset = query_info.field_offset;
        let meta = self.schema.get(offset).ok_or_else(|| {
            SegcoreError::invalid_argument(format!("Field offset {offset} out of range"))
        })?;

        let entry = match query_info.metric {
            Some(metric) => state.vector_indexings.get_by_metric(offset, metric),
            None => state.vector_indexings.get(offset),
        };
        let Some(entry) = entry else {
            if !state.vector_indexings.is_ready(offset) {
                panic!(
                    "vector search dispatched on field '{}' which has no vector index loaded",
                    meta.name()
                );
            }
            return Err(SegcoreError::index(format!(
                "field '{}' has no {} index",
                meta.name(),
                query_info.metric.map_or("primary", |metric| metric.name())
            )));
        };

        let row_count = state.row_count.unwrap_or(0);
        if !filter.is_empty() && filter.len() < row_count {
            return Err(SegcoreError::invalid_argument(format!(
                "visibility filter covers {} rows but the segment has {row_count}",
                filter.len()
            )));
        }

        debug!(
            target: "segcore.segment",
            segment_id = self.config.segment_id,
            field = %meta.name(),
            index_type = entry.index.index_type(),
            metric = entry.metric.name(),
            num_queries = dataset.num_queries(),
            topk = query_info.topk,
            "dispatching vector search"
        );
        entry
            .index
            .search(dataset, query_info.topk, &query_info.search_params, filter)
    }

    fn load_row_ids(&self, info: LoadFieldDataInfo) -> Result<()> {
        if info.row_count == 0 {
            return Err(SegcoreError::field("row id load carries no rows"));
        }
        let expected = info.row_count.checked_mul(8).ok_or_else(|| {
            SegcoreError::field(format!("row count {} overflows", info.row_count))
        })?;
        if info.blob.len() != expected {
            return Err(SegcoreError::field(format!(
                "row id buffer holds {} bytes, expected {expected}",
                info.blob.len()
            )));
        }
        let mut row_ids = vec![0i64; info.row_count];
        LittleEndian::read_i64_into(&info.blob, &mut row_ids);

        let mut state = self.state.write();
        if self.system_ready_count.load(Ordering::Acquire) != 0 {
            return Err(SegcoreError::field("row ids are already loaded"));
        }
        state.check_row_count(info.row_count).inspect_err(|e| {
            warn!(
                target: "segcore.segment",
                segment_id = self.config.segment_id,
                error = %e,
                "rejected row id load"
            );
        })?;
        state.row_ids = row_ids;
        state.update_row_count(info.row_count);
        self.system_ready_count.fetch_add(1, Ordering::Release);
        drop(state);

        debug!(
            target: "segcore.segment",
            segment_id = self.config.segment_id,
            row_count = info.row_count,
            "loaded row ids"
        );
        Ok(())
    }

    fn drop_row_ids(&self) -> bool {
        let mut state = self.state.write();
        if self.system_ready_count.load(Ordering::Acquire) == 0 {
            return false;
        }
        self.system_ready_count.fetch_sub(1, Ordering::Release);
        let released = std::mem::take(&mut state.row_ids);
        drop(state);

        debug!(
            target: "segcore.segment",
            segment_id = self.config.segment_id,
            row_count = released.len(),
            "dropped row ids"
        );
        true
    }

    fn validate_index(&self, offset: FieldOffset, index: &LoadedIndex) -> Result<()> {
        let meta = &self.schema[offset];
        match index {
            LoadedIndex::Vector(index) => {
                if !meta.is_vector() {
                    return Err(SegcoreError::index(format!(
                        "field '{}' is not a vector field",
                        meta.name()
                    )));
                }
                if meta.dim() != Some(index.dimension()) {
                    return Err(SegcoreError::index(format!(
                        "field '{}' has dimension {:?}, index has {}",
                        meta.name(),
                        meta.dim(),
                        index.dimension()
                    )));
                }
            }
            LoadedIndex::Scalar(index) => {
                if meta.is_vector() {
                    return Err(SegcoreError::index(format!(
                        "field '{}' is a vector field",
                        meta.name()
                    )));
                }
                if index.data_type() != meta.data_type() {
                    return Err(SegcoreError::index(format!(
                        "field '{}' is {}, index was built over {}",
                        meta.name(),
                        meta.data_type().name(),
                        index.data_type().name()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SegmentInterface for SealedSegment {
    fn get_schema(&self) -> &Schema {
        &self.schema
    }

    fn get_row_count(&self) -> Option<usize> {
        self.state.read().row_count
    }

    fn get_memory_usage_in_bytes(&self) -> usize {
        self.state.read().memory_usage()
    }

    fn num_chunk(&self) -> usize {
        1
    }

    fn size_per_chunk(&self) -> usize {
        self.state.read().row_count.unwrap_or(0)
    }

    fn num_chunk_index(&self, offset: FieldOffset) -> usize {
        self.state.read().vector_indexings.num_chunk_index(offset)
    }

    fn chunk_data(&self, offset: FieldOffset, chunk_id: usize) -> Option<ChunkView<'_>> {
        let state = self.state.read();
        let span = state.field_data.chunk_data(offset, chunk_id)?;
        let (row_count, size_per_row, data_type) =
            (span.row_count(), span.size_per_row(), span.data_type());
        let data = RwLockReadGuard::try_map(state, |state| {
            state
                .field_data
                .chunk_data(offset, chunk_id)
                .map(|span| span.data())
        })
        .ok()?;
        Some(ChunkView {
            data,
            row_count,
            size_per_row,
            data_type,
        })
    }

    fn chunk_index(&self, offset: FieldOffset, chunk_id: usize) -> Option<Arc<dyn VectorIndex>> {
        self.state
            .read()
            .vector_indexings
            .chunk_index(offset, chunk_id)
            .cloned()
    }

    fn scalar_index(&self, offset: FieldOffset) -> Option<Arc<dyn ScalarIndex>> {
        self.state.read().scalar_indexings.get(&offset).cloned()
    }

    fn is_field_ready(&self, offset: FieldOffset) -> bool {
        self.state.read().field_ready.test(offset.get())
    }

    fn is_system_field_ready(&self) -> bool {
        self.system_ready_count.load(Ordering::Acquire) == 1
    }

    fn check_search(&self, plan: &Plan) -> Result<()> {
        let state = self.state.read();
        self.check_search_locked(&state, plan)
    }

    fn bulk_subscript_system_into(
        &self,
        system_type: SystemFieldType,
        seg_offsets: &[SegOffset],
        output: &mut [i64],
    ) {
        match system_type {
            SystemFieldType::RowId => {
                let state = self.state.read();
                self.gather_row_ids(&state, seg_offsets, output);
            }
        }
    }

    fn bulk_subscript_into<T: GatherScalar>(
        &self,
        offset: FieldOffset,
        seg_offsets: &[SegOffset],
        output: &mut [T],
    ) {
        let state = self.state.read();
        let meta = &self.schema[offset];
        assert!(
            state.field_ready.test(offset.get()),
            "User Field({}) is not loaded",
            meta.name()
        );
        assert_eq!(
            meta.data_type(),
            T::DATA_TYPE,
            "field '{}' of type {} gathered as {}",
            meta.name(),
            meta.data_type().name(),
            T::DATA_TYPE.name()
        );

        let threshold = self.config.parallel_gather_threshold;
        if let Some(data) = state.field_data.get(offset) {
            gather_into(seg_offsets, output, threshold, |row| data.value(row));
        } else if let Some(index) = state.scalar_indexings.get(&offset) {
            gather_into(seg_offsets, output, threshold, |row| {
                match index.reverse_lookup(row) {
                    Some(value) => T::from_index_value(value),
                    None => panic!(
                        "{} index on field '{}' cannot recover row {row}",
                        index.index_type(),
                        meta.name()
                    ),
                }
            });
        } else {
            panic!(
                "field '{}' is ready but holds neither data nor a scalar index",
                meta.name()
            );
        }
    }

    fn vector_search(
        &self,
        query_info: &QueryInfo,
        dataset: &SearchDataset<'_>,
        filter: &BitsetView,
    ) -> Result<SearchResult> {
        let state = self.state.read();
        self.vector_search_locked(&state, query_info, dataset, filter)
    }

    fn search(
        &self,
        plan: &Plan,
        dataset: &SearchDataset<'_>,
        filter: &BitsetView,
    ) -> Result<SearchResult> {
        let state = self.state.read();
        self.check_search_locked(&state, plan)?;
        let query_info = plan
            .query_info()
            .ok_or_else(|| SegcoreError::invalid_argument("plan carries no vector query"))?;

        let mut result = self.vector_search_locked(&state, query_info, dataset, filter)?;
        let mut row_ids = vec![0i64; result.seg_offsets.len()];
        self.gather_row_ids(&state, &result.seg_offsets, &mut row_ids);
        result.row_ids = row_ids;
        Ok(result)
    }
}

impl SegmentSealed for SealedSegment {
    fn load_field_data(&self, info: LoadFieldDataInfo) -> Result<()> {
        if info.is_system_field() {
            return self.load_row_ids(info);
        }

        let offset = self.schema.get_offset(info.field_id)?;
        let meta = &self.schema[offset];
        let row_count = info.row_count;
        if row_count == 0 {
            return Err(SegcoreError::field(format!(
                "load of field '{}' carries no rows",
                meta.name()
            )));
        }
        let data = FieldData::new(meta, row_count, info.blob)?;
        let bytes = data.byte_size();

        let mut state = self.state.write();
        if state.field_data.is_loaded(offset) {
            return Err(SegcoreError::field(format!(
                "field '{}' data is already loaded",
                meta.name()
            )));
        }
        state.check_row_count(row_count).inspect_err(|e| {
            warn!(
                target: "segcore.segment",
                segment_id = self.config.segment_id,
                field = %meta.name(),
                error = %e,
                "rejected field data load"
            );
        })?;
        state.field_data.install(offset, data);
        state.update_row_count(row_count);
        state.field_ready.set(offset.get(), true);
        drop(state);

        debug!(
            target: "segcore.segment",
            segment_id = self.config.segment_id,
            field = %meta.name(),
            offset = offset.get(),
            row_count,
            bytes,
            "loaded field data"
        );
        Ok(())
    }

    fn load_index(&self, info: LoadIndexInfo) -> Result<()> {
        let offset = self.schema.get_offset(info.field_id)?;
        let meta = &self.schema[offset];
        self.validate_index(offset, &info.index)?;

        let row_count = info.index.row_count();
        if row_count == 0 {
            return Err(SegcoreError::index(format!(
                "index of field '{}' covers no rows",
                meta.name()
            )));
        }
        let bytes = info.index.memory_usage();
        let index_type = info.index.index_type().to_string();

        let mut state = self.state.write();
        state.check_row_count(row_count).inspect_err(|e| {
            warn!(
                target: "segcore.segment",
                segment_id = self.config.segment_id,
                field = %meta.name(),
                error = %e,
                "rejected index load"
            );
        })?;
        let replaced = match info.index {
            LoadedIndex::Scalar(index) => state.scalar_indexings.insert(offset, index).is_some(),
            LoadedIndex::Vector(index) => state.vector_indexings.append(offset, index).is_some(),
        };
        state.update_row_count(row_count);
        state.field_ready.set(offset.get(), true);
        drop(state);

        debug!(
            target: "segcore.segment",
            segment_id = self.config.segment_id,
            field = %meta.name(),
            offset = offset.get(),
            index_type = %index_type,
            bytes,
            replaced,
            "loaded index"
        );
        Ok(())
    }

    fn drop_field_data(&self, field_id: FieldId) -> Result<bool> {
        if field_id == ROW_ID_FIELD_ID {
            return Ok(self.drop_row_ids());
        }

        let offset = self.schema.get_offset(field_id)?;
        let mut state = self.state.write();
        let released = state.field_data.take(offset);
        state.refresh_ready(offset);
        let still_ready = state.field_ready.test(offset.get());
        drop(state);

        let Some(released) = released else {
            return Ok(false);
        };
        debug!(
            target: "segcore.segment",
            segment_id = self.config.segment_id,
            field = %self.schema[offset].name(),
            bytes = released.byte_size(),
            still_ready,
            "dropped field data"
        );
        Ok(true)
    }

    fn drop_index(&self, field_id: FieldId) -> Result<bool> {
        let offset = self.schema.get_offset(field_id)?;
        let mut state = self.state.write();
        let scalar = state.scalar_indexings.remove(&offset);
        let vector = state.vector_indexings.drop_field(offset);
        state.refresh_ready(offset);
        let still_ready = state.field_ready.test(offset.get());
        drop(state);

        if scalar.is_none() && vector.is_empty() {
            return Ok(false);
        }
        let bytes = scalar.as_ref().map_or(0, |index| index.memory_usage())
            + vector
                .iter()
                .map(|entry| entry.index.memory_usage())
                .sum::<usize>();
        debug!(
            target: "segcore.segment",
            segment_id = self.config.segment_id,
            field = %self.schema[offset].name(),
            bytes,
            still_ready,
            "dropped index"
        );
        Ok(true)
    }
}

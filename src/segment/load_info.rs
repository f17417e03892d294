//! Requests a loader hands to a sealed segment.

use crate::index::LoadedIndex;
use crate::schema::FieldId;
use crate::segment::ROW_ID_FIELD_ID;
use crate::storage::{encode_f32s, encode_i64s};

/// One column's raw little-endian buffer.
///
/// A `field_id` of [`ROW_ID_FIELD_ID`] targets the row-id system column.
#[derive(Debug, Clone)]
pub struct LoadFieldDataInfo {
    pub field_id: FieldId,
    pub row_count: usize,
    pub blob: Vec<u8>,
}

impl LoadFieldDataInfo {
    pub fn new(field_id: FieldId, row_count: usize, blob: Vec<u8>) -> Self {
        LoadFieldDataInfo {
            field_id,
            row_count,
            blob,
        }
    }

    /// Row-id system column.
    pub fn row_ids(row_ids: &[i64]) -> Self {
        Self::new(ROW_ID_FIELD_ID, row_ids.len(), encode_i64s(row_ids))
    }

    /// Int64 column, one value per row.
    pub fn from_i64s(field_id: FieldId, values: &[i64]) -> Self {
        Self::new(field_id, values.len(), encode_i64s(values))
    }

    /// Float vector column of `row_count` rows.
    pub fn from_f32s(field_id: FieldId, row_count: usize, values: &[f32]) -> Self {
        Self::new(field_id, row_count, encode_f32s(values))
    }

    pub fn is_system_field(&self) -> bool {
        self.field_id == ROW_ID_FIELD_ID
    }
}

/// One index of a field.
#[derive(Debug, Clone)]
pub struct LoadIndexInfo {
    pub field_id: FieldId,
    pub index: LoadedIndex,
}

impl LoadIndexInfo {
    pub fn new<I: Into<LoadedIndex>>(field_id: FieldId, index: I) -> Self {
        LoadIndexInfo {
            field_id,
            index: index.into(),
        }
    }
}

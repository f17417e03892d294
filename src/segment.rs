//! Sealed segments.
//!
//! A sealed segment holds one immutable partition of a collection. Column
//! buffers and indexes arrive from a loader in any order. The segment tracks
//! which fields are queryable and answers gathers and vector searches
//! against whatever is ready. Queries touching fields that are not ready
//! fail with an error naming the field.
//!
//! # Module Structure
//!
//! - `config`: Segment configuration
//! - `load_info`: Loader requests
//! - `interface`: Read-side and write-side segment traits
//! - `sealed`: The sealed segment implementation

pub mod config;
pub mod interface;
pub mod load_info;
pub mod sealed;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::FieldId;

pub use config::SealedSegmentConfig;
pub use interface::{SegmentInterface, SegmentSealed};
pub use load_info::{LoadFieldDataInfo, LoadIndexInfo};
pub use sealed::{ChunkView, SealedSegment, SegmentStats};

/// Field id reserved for the row-id system column.
pub const ROW_ID_FIELD_ID: FieldId = FieldId(0);

/// Columns every segment carries outside the user schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemFieldType {
    RowId,
}

impl fmt::Display for SystemFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemFieldType::RowId => f.write_str("RowID"),
        }
    }
}

//! Schema module for segcore.
//!
//! Field descriptors and the ordered schema that maps catalog field ids to
//! the dense field offsets segments use for addressing.

pub mod field;
#[allow(clippy::module_inception)]
pub mod schema;

pub use field::{DataType, FieldId, FieldMeta, FieldName, FieldOffset};
pub use schema::Schema;

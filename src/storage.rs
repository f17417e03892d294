//! Column storage for sealed segments.
//!
//! - [`field_data`]: one loaded column's raw buffer, typed decoding, the
//!   possibly-absent row reference [`SegOffset`] and the scatter-gather
//!   used by `bulk_subscript`.
//! - [`chunked`]: the per-field-offset store with chunk-indexed accessors.

pub mod chunked;
pub mod field_data;

pub use chunked::ChunkedFieldStore;
pub use field_data::{FieldData, GatherScalar, SegOffset, Span, encode_f32s, encode_i64s, gather_into};

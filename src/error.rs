//! Error types for the segcore library.
//!
//! Every recoverable failure of a sealed segment is represented by the
//! [`SegcoreError`] enum. Loader-facing failures (row-count mismatch, bad
//! buffers, unknown fields) and query-facing failures (a plan touching a
//! field that is not loaded) are values of this type.
//!
//! Internal invariant violations, such as dispatching a vector search on a
//! field that passed the readiness gate but has no vector index, are not
//! represented here. They panic, because continuing would risk returning
//! wrong query results.
//!
//! # Examples
//!
//! ```
//! use segcore::error::{Result, SegcoreError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(SegcoreError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

use crate::segment::SystemFieldType;

/// The main error type for segcore operations.
#[derive(Error, Debug)]
pub enum SegcoreError {
    /// A load reported a row count that differs from the one already
    /// established by an earlier load.
    #[error(
        "load data has different row count from other columns (expected {expected}, got {actual})"
    )]
    InconsistentRowCount { expected: usize, actual: usize },

    /// A query needs a system column that has not been loaded.
    #[error("System Field {0} is not loaded")]
    SystemFieldNotLoaded(SystemFieldType),

    /// A query needs a user field that has not been loaded.
    #[error("User Field({0}) is not loaded")]
    FieldNotLoaded(String),

    /// Schema-related errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Field-related errors (bad buffers, wrong types)
    #[error("Field error: {0}")]
    Field(String),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with SegcoreError.
pub type Result<T> = std::result::Result<T, SegcoreError>;

impl SegcoreError {
    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        SegcoreError::Schema(msg.into())
    }

    /// Create a new field error.
    pub fn field<S: Into<String>>(msg: S) -> Self {
        SegcoreError::Field(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        SegcoreError::Index(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        SegcoreError::InvalidArgument(msg.into())
    }

    /// Create a new "user field not loaded" error.
    pub fn field_not_loaded<S: Into<String>>(name: S) -> Self {
        SegcoreError::FieldNotLoaded(name.into())
    }

    /// Whether this error reports a field or system column that is not ready.
    pub fn is_not_loaded(&self) -> bool {
        matches!(
            self,
            SegcoreError::FieldNotLoaded(_) | SegcoreError::SystemFieldNotLoaded(_)
        )
    }
}

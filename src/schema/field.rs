//! Field descriptors for sealed segment schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegcoreError};
use crate::index::MetricType;

/// Stable, catalog-level identifier of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(pub i64);

impl FieldId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dense, zero-based position of a field within the schema ordering.
///
/// This is the internal addressing key of a segment. It is never
/// interchangeable with [`FieldId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldOffset(pub usize);

impl FieldOffset {
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for FieldOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldName(String);

impl FieldName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        FieldName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    /// Dense float vector, `dim` f32 values per row.
    VectorFloat,
    /// Packed binary vector, `dim` bits per row.
    VectorBinary,
}

impl DataType {
    /// Size in bytes of one scalar element. Vector types report the size of
    /// a single component and need the dimension to size a row.
    pub fn element_size(&self) -> usize {
        match self {
            DataType::Bool | DataType::Int8 => 1,
            DataType::Int16 => 2,
            DataType::Int32 | DataType::Float => 4,
            DataType::Int64 | DataType::Double => 8,
            DataType::VectorFloat => 4,
            DataType::VectorBinary => 1,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::VectorFloat | DataType::VectorBinary)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::VectorFloat => "vector_float",
            DataType::VectorBinary => "vector_binary",
        }
    }
}

/// Descriptor of one schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    id: FieldId,
    name: FieldName,
    data_type: DataType,
    /// Vector dimension, `None` for scalar fields.
    dim: Option<usize>,
    /// Default metric for vector fields.
    metric: Option<MetricType>,
}

impl FieldMeta {
    /// Create a scalar field descriptor.
    pub fn scalar<S: Into<String>>(id: FieldId, name: S, data_type: DataType) -> Result<Self> {
        if data_type.is_vector() {
            return Err(SegcoreError::schema(format!(
                "{} is a vector type, use FieldMeta::vector",
                data_type.name()
            )));
        }
        Ok(FieldMeta {
            id,
            name: FieldName::new(name),
            data_type,
            dim: None,
            metric: None,
        })
    }

    /// Create a vector field descriptor.
    pub fn vector<S: Into<String>>(
        id: FieldId,
        name: S,
        data_type: DataType,
        dim: usize,
        metric: MetricType,
    ) -> Result<Self> {
        let name = name.into();
        if !data_type.is_vector() {
            return Err(SegcoreError::schema(format!(
                "field '{name}': {} is not a vector type",
                data_type.name()
            )));
        }
        if dim == 0 {
            return Err(SegcoreError::schema(format!(
                "field '{name}': vector dimension must be positive"
            )));
        }
        if data_type == DataType::VectorBinary && dim % 8 != 0 {
            return Err(SegcoreError::schema(format!(
                "field '{name}': binary vector dimension {dim} is not a multiple of 8"
            )));
        }
        Ok(FieldMeta {
            id,
            name: FieldName::new(name),
            data_type,
            dim: Some(dim),
            metric: Some(metric),
        })
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn name(&self) -> &FieldName {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn metric(&self) -> Option<MetricType> {
        self.metric
    }

    pub fn is_vector(&self) -> bool {
        self.data_type.is_vector()
    }

    /// Number of bytes one row of this field occupies in a raw column buffer.
    pub fn size_per_row(&self) -> usize {
        match (self.data_type, self.dim) {
            (DataType::VectorFloat, Some(dim)) => dim * 4,
            (DataType::VectorBinary, Some(dim)) => dim / 8,
            (data_type, _) => data_type.element_size(),
        }
    }
}

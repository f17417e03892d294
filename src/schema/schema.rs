//! Schema definition for sealed segments.

use std::ops::Index;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegcoreError};
use crate::index::MetricType;
use crate::schema::field::{DataType, FieldId, FieldMeta, FieldOffset};

/// An ordered, immutable-once-shared list of field descriptors.
///
/// The position of a field in this list is its [`FieldOffset`]. Segments
/// hold the schema behind an `Arc` and never mutate it.
///
/// Deserialization rebuilds the lookup tables and rejects duplicate ids or
/// names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "SchemaFields")]
pub struct Schema {
    fields: Vec<FieldMeta>,
    #[serde(skip)]
    id_to_offset: AHashMap<FieldId, FieldOffset>,
    #[serde(skip)]
    name_to_offset: AHashMap<String, FieldOffset>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from descriptors, in order.
    pub fn from_fields(fields: Vec<FieldMeta>) -> Result<Self> {
        let mut schema = Schema::new();
        for field in fields {
            schema.push(field)?;
        }
        Ok(schema)
    }

    /// Add a scalar field and return its offset.
    pub fn add_field<S: Into<String>>(
        &mut self,
        id: FieldId,
        name: S,
        data_type: DataType,
    ) -> Result<FieldOffset> {
        self.push(FieldMeta::scalar(id, name, data_type)?)
    }

    /// Add a vector field and return its offset.
    pub fn add_vector_field<S: Into<String>>(
        &mut self,
        id: FieldId,
        name: S,
        data_type: DataType,
        dim: usize,
        metric: MetricType,
    ) -> Result<FieldOffset> {
        self.push(FieldMeta::vector(id, name, data_type, dim, metric)?)
    }

    fn push(&mut self, field: FieldMeta) -> Result<FieldOffset> {
        if field.name().as_str().is_empty() {
            return Err(SegcoreError::schema("Field name cannot be empty"));
        }
        if self.id_to_offset.contains_key(&field.id()) {
            return Err(SegcoreError::schema(format!(
                "Field id {} already exists",
                field.id()
            )));
        }
        if self.name_to_offset.contains_key(field.name().as_str()) {
            return Err(SegcoreError::schema(format!(
                "Field '{}' already exists",
                field.name()
            )));
        }

        let offset = FieldOffset(self.fields.len());
        self.id_to_offset.insert(field.id(), offset);
        self.name_to_offset
            .insert(field.name().as_str().to_string(), offset);
        self.fields.push(field);
        Ok(offset)
    }

    /// Resolve a catalog field id to its offset.
    pub fn get_offset(&self, id: FieldId) -> Result<FieldOffset> {
        self.id_to_offset
            .get(&id)
            .copied()
            .ok_or_else(|| SegcoreError::schema(format!("Field id {id} does not exist")))
    }

    /// Resolve a field name to its offset.
    pub fn offset_by_name(&self, name: &str) -> Result<FieldOffset> {
        self.name_to_offset
            .get(name)
            .copied()
            .ok_or_else(|| SegcoreError::schema(format!("Field '{name}' does not exist")))
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldMeta> {
        self.name_to_offset
            .get(name)
            .map(|offset| &self.fields[offset.get()])
    }

    pub fn get(&self, offset: FieldOffset) -> Option<&FieldMeta> {
        self.fields.get(offset.get())
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

}

#[derive(Deserialize)]
struct SchemaFields {
    fields: Vec<FieldMeta>,
}

impl TryFrom<SchemaFields> for Schema {
    type Error = SegcoreError;

    fn try_from(repr: SchemaFields) -> Result<Self> {
        Schema::from_fields(repr.fields)
    }
}

impl Index<FieldOffset> for Schema {
    type Output = FieldMeta;

    fn index(&self, offset: FieldOffset) -> &FieldMeta {
        &self.fields[offset.get()]
    }
}

//! Query plans as seen by a sealed segment.
//!
//! Parsing query expressions is done upstream. A segment only needs the
//! set of fields a plan touches and, for vector queries, where and how to
//! search.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegcoreError};
use crate::index::MetricType;
use crate::schema::{FieldOffset, Schema};
use crate::util::bitset::FieldBitset;

/// Parameters of a vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    /// Vector field to search.
    pub field_offset: FieldOffset,
    /// Number of results per query vector.
    pub topk: usize,
    /// Metric selecting among a field's indexes; the primary index when unset.
    pub metric: Option<MetricType>,
    /// Index-specific knobs, e.g. `{"nprobe": 16}`.
    pub search_params: serde_json::Value,
}

impl QueryInfo {
    pub fn new(field_offset: FieldOffset, topk: usize) -> Self {
        QueryInfo {
            field_offset,
            topk,
            metric: None,
            search_params: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metric(mut self, metric: MetricType) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn with_search_params(mut self, params: serde_json::Value) -> Result<Self> {
        if !params.is_object() {
            return Err(SegcoreError::invalid_argument(format!(
                "search params must be a JSON object, got {params}"
            )));
        }
        self.search_params = params;
        Ok(self)
    }

    /// Parse search params from a JSON string.
    pub fn with_search_params_str(self, params: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(params)?;
        self.with_search_params(value)
    }
}

/// The fields a query touches and the vector search it performs, if any.
#[derive(Debug, Clone)]
pub struct Plan {
    involved_fields: FieldBitset,
    query_info: Option<QueryInfo>,
}

impl Plan {
    pub fn new(involved_fields: FieldBitset, query_info: Option<QueryInfo>) -> Self {
        Plan {
            involved_fields,
            query_info,
        }
    }

    /// One bit per schema field, set for every field the plan reads.
    pub fn involved_fields(&self) -> &FieldBitset {
        &self.involved_fields
    }

    pub fn query_info(&self) -> Option<&QueryInfo> {
        self.query_info.as_ref()
    }
}

/// Builds a [`Plan`] by resolving field names through a schema.
#[derive(Debug)]
pub struct PlanBuilder<'a> {
    schema: &'a Schema,
    involved_fields: FieldBitset,
    query_info: Option<QueryInfo>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        PlanBuilder {
            schema,
            involved_fields: FieldBitset::new(schema.len()),
            query_info: None,
        }
    }

    /// Mark a field as read by the plan.
    pub fn field(mut self, name: &str) -> Result<Self> {
        let offset = self.schema.offset_by_name(name)?;
        self.involved_fields.set(offset.get(), true);
        Ok(self)
    }

    pub fn field_offset(mut self, offset: FieldOffset) -> Result<Self> {
        if offset.get() >= self.schema.len() {
            return Err(SegcoreError::schema(format!(
                "Field offset {offset} out of range for {} fields",
                self.schema.len()
            )));
        }
        self.involved_fields.set(offset.get(), true);
        Ok(self)
    }

    /// Search `topk` nearest rows on a vector field.
    pub fn vector_query(mut self, name: &str, topk: usize) -> Result<Self> {
        let offset = self.schema.offset_by_name(name)?;
        if !self.schema[offset].is_vector() {
            return Err(SegcoreError::schema(format!(
                "Field '{name}' is not a vector field"
            )));
        }
        if topk == 0 {
            return Err(SegcoreError::invalid_argument("topk must be positive"));
        }
        self.involved_fields.set(offset.get(), true);
        self.query_info = Some(QueryInfo::new(offset, topk));
        Ok(self)
    }

    pub fn metric(mut self, metric: MetricType) -> Result<Self> {
        let info = self
            .query_info
            .take()
            .ok_or_else(|| SegcoreError::invalid_argument("metric set before vector_query"))?;
        self.query_info = Some(info.with_metric(metric));
        Ok(self)
    }

    pub fn search_params(mut self, params: serde_json::Value) -> Result<Self> {
        let info = self.query_info.take().ok_or_else(|| {
            SegcoreError::invalid_argument("search params set before vector_query")
        })?;
        self.query_info = Some(info.with_search_params(params)?);
        Ok(self)
    }

    pub fn build(self) -> Plan {
        Plan::new(self.involved_fields, self.query_info)
    }
}

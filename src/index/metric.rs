//! Similarity metrics for vector search.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegcoreError};
use crate::util::simd;

/// Metric used to rank vector search results.
///
/// [`MetricType::distance`] is always "smaller is closer" so results of any
/// metric can be ordered ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MetricType {
    /// Squared euclidean distance
    #[default]
    L2,
    /// Inner product, reported negated
    IP,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
}

impl MetricType {
    /// Calculate the distance between two vectors of equal dimension.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        match self {
            MetricType::L2 => simd::l2_squared(a, b),
            MetricType::IP => -simd::dot_product(a, b),
            MetricType::Cosine => {
                let norm_a = simd::norm(a);
                let norm_b = simd::norm(b);
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0 // Maximum distance for zero vectors
                } else {
                    1.0 - simd::dot_product(a, b) / (norm_a * norm_b)
                }
            }
        }
    }

    /// Get the name of this metric.
    pub fn name(&self) -> &'static str {
        match self {
            MetricType::L2 => "L2",
            MetricType::IP => "IP",
            MetricType::Cosine => "COSINE",
        }
    }

    /// Parse a metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(MetricType::L2),
            "ip" | "dot" | "dot_product" => Ok(MetricType::IP),
            "cosine" => Ok(MetricType::Cosine),
            _ => Err(SegcoreError::invalid_argument(format!(
                "Unknown metric type: {s}"
            ))),
        }
    }
}

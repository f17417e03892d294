//! Sealed segment configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegcoreError};

/// Configuration for a sealed segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealedSegmentConfig {
    /// Segment identifier, reported in logs and stats.
    pub segment_id: u64,

    /// Gathers of at least this many offsets run on the rayon pool.
    pub parallel_gather_threshold: usize,
}

impl Default for SealedSegmentConfig {
    fn default() -> Self {
        Self {
            segment_id: 0,
            parallel_gather_threshold: 4096,
        }
    }
}

impl SealedSegmentConfig {
    /// Default configuration for the given segment.
    pub fn new(segment_id: u64) -> Self {
        Self {
            segment_id,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SealedSegmentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallel_gather_threshold == 0 {
            return Err(SegcoreError::invalid_argument(
                "parallel_gather_threshold must be positive",
            ));
        }
        Ok(())
    }
}

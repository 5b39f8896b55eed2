use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::hash::calculate_parameters;

/// Default chunk size of the paged bit array, 1 MiB.
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 1024 * 1024;

/// Configuration for a paged Bloom filter.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(pattern = "owned", setter(into))]
pub struct FilterConfig {
    /// Path of the backing bit file
    pub path: PathBuf,

    /// Number of elements the filter is sized for
    pub expected_elements: usize,

    /// Target false positive rate (between 0 and 1)
    pub false_positive_rate: f64,

    /// Record attributes participating in hashing, in serialization order
    pub attributes: Vec<String>,

    /// Explicit hash count, overriding the derived optimum
    #[builder(default)]
    pub hash_count: Option<usize>,

    /// Chunk size of the paged bit array in bytes
    #[builder(default = "DEFAULT_CHUNK_SIZE_BYTES")]
    pub chunk_size_bytes: usize,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.expected_elements == 0 {
            return Err(FilterError::InvalidConfig(
                "Expected elements must be > 0".into(),
            ));
        }
        if self.false_positive_rate <= 0.0 || self.false_positive_rate >= 1.0 {
            return Err(FilterError::InvalidConfig(
                "FPR must be between 0 and 1".into(),
            ));
        }
        if self.attributes.is_empty() {
            return Err(FilterError::InvalidConfig(
                "At least one attribute is required".into(),
            ));
        }
        if self.hash_count == Some(0) {
            return Err(FilterError::InvalidConfig(
                "Hash count must be > 0".into(),
            ));
        }
        if self.chunk_size_bytes == 0 {
            return Err(FilterError::InvalidConfig(
                "Chunk size must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Derived parameters calculated from FilterConfig
#[derive(Debug, Clone)]
pub struct FilterParams {
    pub total_bits: usize,
    pub hash_count: usize,
    pub total_bytes: usize,
}

impl From<&FilterConfig> for FilterParams {
    fn from(config: &FilterConfig) -> Self {
        let (total_bits, derived_hash_count) = calculate_parameters(
            config.expected_elements,
            config.false_positive_rate,
        );
        let hash_count = config.hash_count.unwrap_or(derived_hash_count);

        Self {
            total_bits,
            hash_count,
            total_bytes: total_bits.div_ceil(8),
        }
    }
}

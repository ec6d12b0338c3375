//! Reader configuration
//!
//! Construction-time policies for playback region and region sequence
//! readers. Loadable from JSON; every field has a default so partial files
//! are accepted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AraError, Result};

/// Default number of samples rendered per engine block
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 1024;

/// What to do with regions whose source sample rate differs from the reader's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRateMismatchPolicy {
    /// Leave the region out of the reader and log a warning
    #[default]
    Skip,
    /// Fail construction with `SampleRateMismatch`
    Reject,
}

/// What to do when one engine block of a multi-block read fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockFailurePolicy {
    /// Keep rendering the remaining blocks
    #[default]
    Continue,
    /// Silence the rest of the request and stop
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Widen the reader range by each region's head and tail time
    pub include_head_and_tail: bool,
    pub sample_rate_mismatch: SampleRateMismatchPolicy,
    pub block_failure: BlockFailurePolicy,
    /// Largest block handed to the rendering engine
    pub max_block_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            include_head_and_tail: true,
            sample_rate_mismatch: SampleRateMismatchPolicy::default(),
            block_failure: BlockFailurePolicy::default(),
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
        }
    }
}

impl ReaderConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReaderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_block_size == 0 {
            return Err(AraError::InvalidConfig {
                reason: "max_block_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_head_and_tail(mut self, include: bool) -> Self {
        self.include_head_and_tail = include;
        self
    }

    pub fn with_sample_rate_mismatch(mut self, policy: SampleRateMismatchPolicy) -> Self {
        self.sample_rate_mismatch = policy;
        self
    }

    pub fn with_block_failure(mut self, policy: BlockFailurePolicy) -> Self {
        self.block_failure = policy;
        self
    }

    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }
}

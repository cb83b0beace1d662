//! Parameters for cipher generation, voting and confidence scoring

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::voting::LOCUS_WINDOW;

/// Hash used to turn a k-mer into a 64-bit value before keying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMode {
    /// SHA-256 truncated to its first 64 bits
    Sha256,
    /// xxHash64; fast but not suitable for private runs
    Xxh64,
}

impl HashMode {
    pub fn name(self) -> &'static str {
        match self {
            HashMode::Sha256 => "sha256",
            HashMode::Xxh64 => "xxh64",
        }
    }
}

/// How construction and voting are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Materialize every task, then vote on all of them
    Batched,
    /// Build, vote and reduce one read at a time without a task list
    Monolithic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingParams {
    /// K-mer length used for voting
    #[serde(default = "default_k")]
    pub k: usize,

    /// Stride of kept reference k-mers
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval: usize,

    /// Maximum contigs per task
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Votes a best hit must exceed before it earns a confidence score
    #[serde(default = "default_votes_cutoff")]
    pub votes_cutoff: u32,

    /// Scale factor applied to the best/second-best margin
    #[serde(default = "default_confidence_scale")]
    pub confidence_scale: f32,

    /// Scale confidence by the ratio of a read's votes to the corpus average
    #[serde(default)]
    pub enable_scaling: bool,

    /// Allowed distance between a hit's offset and the dominant offset
    #[serde(default = "default_offset_tolerance")]
    pub offset_tolerance: u32,

    #[serde(default = "default_hash_mode")]
    pub hash: HashMode,

    #[serde(default = "default_mode")]
    pub mode: PipelineMode,

    /// Run seed for keys and fillers; drawn from OS entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_k() -> usize { 20 }
fn default_sampling_interval() -> usize { 3 }
fn default_batch_size() -> usize { 32 }
fn default_votes_cutoff() -> u32 { 0 }
fn default_confidence_scale() -> f32 { 250.0 }
fn default_offset_tolerance() -> u32 { 8 }
fn default_hash_mode() -> HashMode { HashMode::Sha256 }
fn default_mode() -> PipelineMode { PipelineMode::Batched }

impl Default for VotingParams {
    fn default() -> Self {
        Self {
            k: default_k(),
            sampling_interval: default_sampling_interval(),
            batch_size: default_batch_size(),
            votes_cutoff: default_votes_cutoff(),
            confidence_scale: default_confidence_scale(),
            enable_scaling: false,
            offset_tolerance: default_offset_tolerance(),
            hash: default_hash_mode(),
            mode: default_mode(),
            seed: None,
        }
    }
}

impl VotingParams {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.k == 0 || self.k > 64 {
            return Err(PipelineError::invalid_params(format!(
                "k must be in 1..=64, got {}",
                self.k
            )));
        }
        if self.sampling_interval == 0 {
            return Err(PipelineError::invalid_params("sampling_interval must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::invalid_params("batch_size must be at least 1"));
        }
        if !self.confidence_scale.is_finite() || self.confidence_scale < 0.0 {
            return Err(PipelineError::invalid_params(format!(
                "confidence_scale must be finite and non-negative, got {}",
                self.confidence_scale
            )));
        }
        if self.offset_tolerance as i64 >= LOCUS_WINDOW {
            return Err(PipelineError::invalid_params(format!(
                "offset_tolerance must be below the locus window ({}), got {}",
                LOCUS_WINDOW, self.offset_tolerance
            )));
        }
        Ok(())
    }
}

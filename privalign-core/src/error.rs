//! Error handling for privalign-core
//!
//! The alignment phases themselves never fail: an empty candidate set is the
//! absence of a task, and cipher collisions are resolved by substitution.
//! Errors only arise while validating parameters and loading genome tables.

use thiserror::Error;

/// Errors raised while configuring the pipeline or handling genome tables
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Genome tables built with k={table_k} ({table_hash}), pipeline expects k={k} ({hash})")]
    TableMismatch {
        table_k: usize,
        table_hash: String,
        k: usize,
        hash: String,
    },

    #[error("Invalid magic bytes: expected PVGT")]
    InvalidMagic,

    #[error("Unsupported table version: {0}")]
    UnsupportedVersion(u32),

    #[error("Table corruption: {0}")]
    Corruption(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn invalid_params<S: Into<String>>(message: S) -> Self {
        Self::InvalidParams(message.into())
    }
}

//! Error handling for the privalign CLI

use std::path::PathBuf;
use thiserror::Error;

/// Input problems detected by the CLI before the pipeline runs
#[derive(Error, Debug)]
pub enum CliError {
    #[error("No sequence records found in {path}")]
    EmptyReference { path: PathBuf },

    #[error("Genome of {genome_len} bases is too short for {read_len}-base reads")]
    GenomeTooShort { genome_len: usize, read_len: usize },

    #[error("Read length {read_len} does not fit a contig length field (max {max})")]
    ReadTooLong { read_len: usize, max: usize },

    #[error("Genome of {genome_len} bases exceeds the 32-bit coordinate range")]
    GenomeTooLong { genome_len: usize },

    #[error("Invalid simulation setting: {message}")]
    Simulation { message: String },
}

impl CliError {
    pub fn simulation<S: Into<String>>(message: S) -> Self {
        Self::Simulation {
            message: message.into(),
        }
    }
}

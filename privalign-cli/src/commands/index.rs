//! Index command implementation - precompute genome k-mer tables

use anyhow::{Context, Result};
use privalign_core::{GenomeTables, HashMode};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::Config;

pub fn execute(
    config: &Config,
    reference: PathBuf,
    output: PathBuf,
    k: Option<usize>,
    hash: Option<HashMode>,
) -> Result<()> {
    let mut params = config.voting.clone();
    if let Some(k) = k {
        params.k = k;
    }
    if let Some(hash) = hash {
        params.hash = hash;
    }
    params.validate().context("Invalid index parameters")?;

    log::info!("Indexing {} (k={}, hash={})", reference.display(), params.k, params.hash.name());
    let genome = super::load_genome(&reference).context("Failed to load reference genome")?;

    let t = Instant::now();
    let tables = GenomeTables::build(&genome, params.k, params.hash);
    log::info!("Built tables for {} positions in {:.2?}", tables.len(), t.elapsed());

    tables
        .write_to_file(&output)
        .with_context(|| format!("Failed to write genome tables: {}", output.display()))?;
    log::info!("Genome tables written to {}", output.display());
    Ok(())
}

//! Command implementations for the privalign CLI

pub mod index;
pub mod simulate;

use anyhow::{Context, Result};
use needletail::parse_fastx_file;
use std::path::Path;

use crate::error::CliError;

/// Load every record of a FASTA/FASTQ file as one concatenated genome.
///
/// Records are joined by a single `N`, so no k-mer spans two records.
pub fn load_genome(path: &Path) -> Result<Vec<u8>> {
    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("Failed to open sequence file: {}", path.display()))?;

    let mut genome = Vec::new();
    let mut n_records = 0usize;
    while let Some(record) = reader.next() {
        let record = record.with_context(|| format!("Failed to parse record in {}", path.display()))?;
        if n_records > 0 {
            genome.push(b'N');
        }
        genome.extend_from_slice(&record.seq());
        n_records += 1;
    }

    if n_records == 0 {
        return Err(CliError::EmptyReference {
            path: path.to_path_buf(),
        }
        .into());
    }
    if genome.len() > u32::MAX as usize {
        return Err(CliError::GenomeTooLong {
            genome_len: genome.len(),
        }
        .into());
    }

    log::info!(
        "Loaded {} records ({} bases) from {}",
        n_records,
        genome.len(),
        path.display()
    );
    Ok(genome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_records_are_joined_with_separator() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, ">chr1\nACGT\nAC\n>chr2\nGGTT")?;
        let genome = load_genome(file.path())?;
        assert_eq!(genome, b"ACGTACNGGTT".to_vec());
        Ok(())
    }

    #[test]
    fn test_empty_file_is_rejected() -> Result<()> {
        let file = NamedTempFile::new()?;
        assert!(load_genome(file.path()).is_err());
        Ok(())
    }
}

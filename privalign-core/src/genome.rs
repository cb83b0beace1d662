//! Precomputed whole-genome k-mer hash and repeat-distance tables
//!
//! Both tables are genome-length arrays. `kmer_hashes[i]` is the unkeyed hash
//! of the k-mer starting at `i` (0 when the k-mer is ambiguous or runs off the
//! end). `repeat_distances[i]` is the distance to the next occurrence of the
//! same k-mer, or 0 when there is none within `u16::MAX` bases.
//!
//! Binary layout:
//! - Header { magic="PVGT", version: u32, k: u32, hash mode: u8, length: u64 }
//! - Hashes { length x u64 }
//! - Repeats { length x u16 }

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::cipher::KmerHasher;
use crate::error::{PipelineError, PipelineResult};
use crate::params::HashMode;
use crate::types::Cipher;
use crate::utils::{dense_kmer_count, is_unambiguous};

const TABLE_MAGIC: &[u8; 4] = b"PVGT";
const TABLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeTables {
    k: usize,
    hash_mode: HashMode,
    kmer_hashes: Vec<Cipher>,
    repeat_distances: Vec<u16>,
}

impl GenomeTables {
    /// Wrap tables computed elsewhere
    pub fn from_parts(
        k: usize,
        hash_mode: HashMode,
        kmer_hashes: Vec<Cipher>,
        repeat_distances: Vec<u16>,
    ) -> Self {
        debug_assert_eq!(kmer_hashes.len(), repeat_distances.len());
        Self {
            k,
            hash_mode,
            kmer_hashes,
            repeat_distances,
        }
    }

    /// Hash every k-mer of `sequence` and record the distance to its next repeat
    pub fn build(sequence: &[u8], k: usize, hash_mode: HashMode) -> Self {
        let hasher = KmerHasher::new(hash_mode);
        let n_kmers = dense_kmer_count(sequence.len(), k);

        let mut kmer_hashes: Vec<Cipher> = (0..n_kmers)
            .into_par_iter()
            .map(|i| {
                let window = &sequence[i..i + k];
                if is_unambiguous(window) {
                    hasher.hash(window)
                } else {
                    0
                }
            })
            .collect();
        kmer_hashes.resize(sequence.len(), 0);

        let mut repeat_distances = vec![0u16; sequence.len()];
        let mut next_seen: HashMap<Cipher, usize> = HashMap::new();
        for i in (0..n_kmers).rev() {
            let h = kmer_hashes[i];
            if h == 0 {
                continue;
            }
            if let Some(&next) = next_seen.get(&h) {
                let distance = next - i;
                if distance <= u16::MAX as usize {
                    repeat_distances[i] = distance as u16;
                }
            }
            next_seen.insert(h, i);
        }

        let repeats = repeat_distances.iter().filter(|&&d| d > 0).count();
        log::debug!(
            "Built genome tables: {} bases, k={}, {} k-mers with a nearby repeat",
            sequence.len(),
            k,
            repeats
        );

        Self {
            k,
            hash_mode,
            kmer_hashes,
            repeat_distances,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn hash_mode(&self) -> HashMode {
        self.hash_mode
    }

    pub fn len(&self) -> usize {
        self.kmer_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmer_hashes.is_empty()
    }

    pub fn kmer_hashes(&self) -> &[Cipher] {
        &self.kmer_hashes
    }

    /// Distance to the next repeat of the k-mer at `pos`; 0 when untracked
    pub fn repeat_distance(&self, pos: usize) -> u16 {
        self.repeat_distances.get(pos).copied().unwrap_or(0)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> PipelineResult<()> {
        writer.write_all(TABLE_MAGIC)?;
        writer.write_u32::<LittleEndian>(TABLE_VERSION)?;
        writer.write_u32::<LittleEndian>(self.k as u32)?;
        writer.write_u8(match self.hash_mode {
            HashMode::Sha256 => 0,
            HashMode::Xxh64 => 1,
        })?;
        writer.write_u64::<LittleEndian>(self.kmer_hashes.len() as u64)?;
        for &h in &self.kmer_hashes {
            writer.write_u64::<LittleEndian>(h)?;
        }
        for &d in &self.repeat_distances {
            writer.write_u16::<LittleEndian>(d)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> PipelineResult<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != TABLE_MAGIC {
            return Err(PipelineError::InvalidMagic);
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != TABLE_VERSION {
            return Err(PipelineError::UnsupportedVersion(version));
        }

        let k = reader.read_u32::<LittleEndian>()? as usize;
        let hash_mode = match reader.read_u8()? {
            0 => HashMode::Sha256,
            1 => HashMode::Xxh64,
            other => {
                return Err(PipelineError::Corruption(format!("unknown hash mode tag {}", other)))
            }
        };
        let len = usize::try_from(reader.read_u64::<LittleEndian>()?)
            .map_err(|_| PipelineError::Corruption("table length overflows usize".to_string()))?;

        let mut kmer_hashes = vec![0u64; len];
        reader.read_u64_into::<LittleEndian>(&mut kmer_hashes)?;
        let mut repeat_distances = vec![0u16; len];
        reader.read_u16_into::<LittleEndian>(&mut repeat_distances)?;

        Ok(Self {
            k,
            hash_mode,
            kmer_hashes,
            repeat_distances,
        })
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader)
    }
}

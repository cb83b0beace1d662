use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::utils::reverse_complement;
use crate::voting::TopTwo;

/// Absolute position in the concatenated reference genome
pub type GenomicPos = u32;

/// Fixed-width encrypted k-mer value
pub type Cipher = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    ReverseComplement,
}

impl Strand {
    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::ReverseComplement)
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::ReverseComplement => '-',
        }
    }
}

/// Candidate reference interval ("contig") produced by the candidate generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMatch {
    pub position: GenomicPos,
    pub length: u16,
    pub valid: bool,
    /// Evidence count from the candidate generator; carried through, never voted on
    pub diagnostic_hit_count: u32,
}

impl ReferenceMatch {
    pub fn new(position: GenomicPos, length: u16) -> Self {
        Self {
            position,
            length,
            valid: true,
            diagnostic_hit_count: 0,
        }
    }

    /// Invalid and empty intervals contribute no segment to a task
    pub fn is_usable(&self) -> bool {
        self.valid && self.length > 0
    }
}

/// A sequencing read together with its candidate contigs
#[derive(Debug)]
pub struct Read {
    pub seq: Vec<u8>,
    pub rc: Vec<u8>,
    /// Forward-strand matches first, reverse-complement matches after `n_forward`
    pub matches: Vec<ReferenceMatch>,
    pub n_forward: usize,
    forward_hashes: OnceLock<Vec<Cipher>>,
    reverse_hashes: OnceLock<Vec<Cipher>>,
    pub alignment: TopTwo,
}

impl Read {
    pub fn new(seq: Vec<u8>, matches: Vec<ReferenceMatch>, n_forward: usize) -> Self {
        debug_assert!(n_forward <= matches.len());
        let rc = reverse_complement(&seq);
        let n_forward = n_forward.min(matches.len());
        Self {
            seq,
            rc,
            matches,
            n_forward,
            forward_hashes: OnceLock::new(),
            reverse_hashes: OnceLock::new(),
            alignment: TopTwo::default(),
        }
    }

    /// Build a read from separate forward and reverse-complement candidate lists
    pub fn with_strand_matches(
        seq: Vec<u8>,
        forward: Vec<ReferenceMatch>,
        reverse: Vec<ReferenceMatch>,
    ) -> Self {
        let n_forward = forward.len();
        let mut matches = forward;
        matches.extend(reverse);
        Self::new(seq, matches, n_forward)
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Sequence in the requested orientation
    pub fn oriented(&self, strand: Strand) -> &[u8] {
        match strand {
            Strand::Forward => &self.seq,
            Strand::ReverseComplement => &self.rc,
        }
    }

    /// Index range of the match list belonging to `strand`
    pub fn strand_range(&self, strand: Strand) -> std::ops::Range<usize> {
        match strand {
            Strand::Forward => 0..self.n_forward,
            Strand::ReverseComplement => self.n_forward..self.matches.len(),
        }
    }

    /// Dense per-strand hash cache; the first caller computes it, everyone else copies
    pub(crate) fn strand_hashes<F>(&self, strand: Strand, compute: F) -> &[Cipher]
    where
        F: FnOnce(&[u8]) -> Vec<Cipher>,
    {
        let cell = match strand {
            Strand::Forward => &self.forward_hashes,
            Strand::ReverseComplement => &self.reverse_hashes,
        };
        cell.get_or_init(|| compute(self.oriented(strand)))
    }

    pub fn has_cached_hashes(&self, strand: Strand) -> bool {
        match strand {
            Strand::Forward => self.forward_hashes.get().is_some(),
            Strand::ReverseComplement => self.reverse_hashes.get().is_some(),
        }
    }
}

/// Final per-read alignment handed to the output sink
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub read_id: usize,
    pub global_position: GenomicPos,
    pub strand: Strand,
    pub confidence_score: f32,
    pub best_votes: u32,
    pub second_votes: u32,
}

//! Encrypted k-mer generation
//!
//! Reads are hashed densely (every overlapping k-mer), reference contigs are
//! sampled from the precomputed genome hash table. Both sides of a task are
//! then keyed with the same pair of pads, `c' = (c ^ key1) * key2`, so that
//! equality survives while the values themselves look uniformly random to a
//! party holding only ciphertext.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use xxhash_rust::xxh64::xxh64;

use crate::genome::GenomeTables;
use crate::params::HashMode;
use crate::task::VotingTask;
use crate::types::{Cipher, Read, ReferenceMatch};
use crate::utils::dense_kmer_count;

/// Largest supported k-mer length
pub const MAX_K: usize = 64;

/// Hashes a single k-mer into a non-zero 64-bit value
#[derive(Debug, Clone, Copy)]
pub struct KmerHasher {
    mode: HashMode,
}

impl KmerHasher {
    pub fn new(mode: HashMode) -> Self {
        Self { mode }
    }

    /// Hash is case-insensitive; 0 is reserved for "no usable k-mer"
    pub fn hash(&self, kmer: &[u8]) -> Cipher {
        debug_assert!(kmer.len() <= MAX_K);
        let mut buf = [0u8; MAX_K];
        let len = kmer.len().min(MAX_K);
        for (dst, src) in buf.iter_mut().zip(kmer) {
            *dst = src.to_ascii_uppercase();
        }
        let bytes = &buf[..len];

        let h = match self.mode {
            HashMode::Sha256 => {
                let digest = Sha256::digest(bytes);
                let mut word = [0u8; 8];
                word.copy_from_slice(&digest[..8]);
                u64::from_be_bytes(word)
            }
            HashMode::Xxh64 => xxh64(bytes, 0),
        };
        if h == 0 { 1 } else { h }
    }

    /// Dense hashes of every overlapping k-mer of `seq`
    pub fn hash_kmers(&self, seq: &[u8], k: usize) -> Vec<Cipher> {
        let n = dense_kmer_count(seq.len(), k);
        (0..n).map(|i| self.hash(&seq[i..i + k])).collect()
    }
}

/// Per-task pads. The multiplicative pad is always odd so keying is a bijection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub xor_pad: u64,
    pub mult_pad: u64,
}

impl KeyPair {
    pub fn new(xor_pad: u64, mult_pad: u64) -> Self {
        Self {
            xor_pad,
            mult_pad: mult_pad | 1,
        }
    }

    #[inline]
    pub fn apply(&self, cipher: Cipher) -> Cipher {
        (cipher ^ self.xor_pad).wrapping_mul(self.mult_pad)
    }
}

/// Random stream for one unit of work: task keys, reference fillers and
/// collision fallbacks all come from here.
pub struct CipherStream {
    rng: StdRng,
}

impl CipherStream {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Independent stream for work unit `stream_id` of a run seeded with `run_seed`
    pub fn for_unit(run_seed: u64, stream_id: u64) -> Self {
        let mixed = run_seed ^ stream_id.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self::from_seed(mixed)
    }

    pub fn next_cipher(&mut self) -> Cipher {
        self.rng.gen()
    }

    pub fn key_pair(&mut self) -> KeyPair {
        let xor_pad = self.next_cipher();
        let mult_pad = self.next_cipher();
        KeyPair::new(xor_pad, mult_pad)
    }
}

/// Key every cipher of `buf` in place
pub fn apply_keys(buf: &mut [Cipher], keys: KeyPair) {
    let mut chunks = buf.chunks_exact_mut(4);
    for chunk in &mut chunks {
        chunk[0] = keys.apply(chunk[0]);
        chunk[1] = keys.apply(chunk[1]);
        chunk[2] = keys.apply(chunk[2]);
        chunk[3] = keys.apply(chunk[3]);
    }
    for c in chunks.into_remainder() {
        *c = keys.apply(*c);
    }
}

/// Replace both occurrences of any repeated read cipher with fresh random values.
/// Returns the number of collisions resolved.
pub fn suppress_collisions(ciphers: &mut [Cipher], stream: &mut CipherStream) -> usize {
    let mut first_seen: HashMap<Cipher, usize> = HashMap::with_capacity(ciphers.len());
    let mut collisions = 0;
    for i in 0..ciphers.len() {
        match first_seen.entry(ciphers[i]) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(slot) => {
                let original = *slot.get();
                ciphers[original] = stream.next_cipher();
                ciphers[i] = stream.next_cipher();
                collisions += 1;
            }
        }
    }
    collisions
}

/// Fill one contig segment with sampled reference hashes.
///
/// A sample is kept only when its hash is usable and the next repeat of the
/// same k-mer is either untracked or lies beyond the end of the contig.
/// Anything else becomes a random filler, and a repeat landing inside the
/// contig is zeroed so that its own sample is dropped as well.
/// Returns the number of samples kept.
pub fn fill_reference_segment(
    out: &mut [Cipher],
    genome: &GenomeTables,
    contig: &ReferenceMatch,
    k: usize,
    sampling_interval: usize,
    stream: &mut CipherStream,
) -> usize {
    let start = contig.position as usize;
    let n_kmers = dense_kmer_count(contig.length as usize, k);
    let available = genome.len().saturating_sub(start).min(n_kmers);
    if available < n_kmers {
        log::warn!(
            "Contig at {} (len {}) runs past the genome end; {} k-mers unavailable",
            contig.position,
            contig.length,
            n_kmers - available
        );
    }
    let first = start.min(genome.len());
    let mut hashes = genome.kmer_hashes()[first..first + available].to_vec();

    let mut kept = 0;
    for (j, slot) in out.iter_mut().enumerate() {
        let i = j * sampling_interval;
        if i >= hashes.len() {
            *slot = stream.next_cipher();
            continue;
        }
        let remaining = n_kmers - i;
        let repeat = genome.repeat_distance(start + i) as usize;
        if hashes[i] != 0 && (repeat == 0 || repeat >= remaining) {
            *slot = hashes[i];
            kept += 1;
        } else {
            *slot = stream.next_cipher();
            if repeat > 0 && repeat < remaining && i + repeat < hashes.len() {
                hashes[i + repeat] = 0;
            }
        }
    }
    kept
}

/// Outcome of filling one task
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FillStats {
    pub kept_samples: usize,
    pub collisions: usize,
}

/// Fills task buffers and applies per-task keys
#[derive(Debug, Clone, Copy)]
pub struct CipherGenerator {
    hasher: KmerHasher,
    k: usize,
    sampling_interval: usize,
}

impl CipherGenerator {
    pub fn new(hash: HashMode, k: usize, sampling_interval: usize) -> Self {
        Self {
            hasher: KmerHasher::new(hash),
            k,
            sampling_interval,
        }
    }

    /// Read path with the per-strand cache: hashed once, copied afterwards
    fn copy_read_hashes(&self, task: &mut VotingTask, read: &Read) {
        let hashes = read.strand_hashes(task.strand, |seq| self.hasher.hash_kmers(seq, self.k));
        task.read_segment_mut().copy_from_slice(hashes);
    }

    /// Fill `task` and key it with a fresh pair drawn from `stream`
    pub fn fill(
        &self,
        task: &mut VotingTask,
        read: &Read,
        genome: &GenomeTables,
        stream: &mut CipherStream,
    ) -> FillStats {
        let keys = stream.key_pair();
        self.fill_with_keys(task, read, genome, keys, stream)
    }

    pub fn fill_with_keys(
        &self,
        task: &mut VotingTask,
        read: &Read,
        genome: &GenomeTables,
        keys: KeyPair,
        stream: &mut CipherStream,
    ) -> FillStats {
        self.copy_read_hashes(task, read);

        let mut stats = FillStats::default();
        for contig in 0..task.n_contigs() {
            let m = read.matches[task.contig_match_id(contig)];
            stats.kept_samples += fill_reference_segment(
                task.contig_mut(contig),
                genome,
                &m,
                self.k,
                self.sampling_interval,
                stream,
            );
        }

        apply_keys(task.data_mut(), keys);
        stats.collisions = suppress_collisions(task.read_segment_mut(), stream);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_case_insensitive_and_nonzero() {
        for mode in [HashMode::Sha256, HashMode::Xxh64] {
            let hasher = KmerHasher::new(mode);
            assert_eq!(hasher.hash(b"acgtacgt"), hasher.hash(b"ACGTACGT"));
            assert_ne!(hasher.hash(b"ACGTACGT"), hasher.hash(b"ACGTACGA"));
            assert_ne!(hasher.hash(b"ACGTACGT"), 0);
        }
    }

    #[test]
    fn test_hash_modes_differ() {
        let sha = KmerHasher::new(HashMode::Sha256);
        let xxh = KmerHasher::new(HashMode::Xxh64);
        assert_ne!(sha.hash(b"ACGTACGTACGT"), xxh.hash(b"ACGTACGTACGT"));
    }

    #[test]
    fn test_hash_kmers_count() {
        let hasher = KmerHasher::new(HashMode::Xxh64);
        assert_eq!(hasher.hash_kmers(b"ACGTACGTAC", 4).len(), 7);
        assert!(hasher.hash_kmers(b"ACG", 4).is_empty());
    }

    #[test]
    fn test_key_pair_forces_odd_multiplier() {
        let keys = KeyPair::new(0xDEAD_BEEF, 0x10);
        assert_eq!(keys.mult_pad, 0x11);
    }

    #[test]
    fn test_apply_keys_matches_scalar() {
        let keys = KeyPair::new(0x1234_5678_9ABC_DEF0, 0xFFFF_0000_1111_2223);
        let original: Vec<Cipher> = (0..11u64).map(|i| i.wrapping_mul(0x0123_4567_89AB_CDEF)).collect();
        let mut buf = original.clone();
        apply_keys(&mut buf, keys);
        for (c, &o) in buf.iter().zip(&original) {
            assert_eq!(*c, (o ^ keys.xor_pad).wrapping_mul(keys.mult_pad));
        }
    }

    #[test]
    fn test_keying_preserves_equality() {
        let mut stream = CipherStream::from_seed(7);
        let keys = stream.key_pair();
        assert_eq!(keys.apply(42), keys.apply(42));
        assert_ne!(keys.apply(42), keys.apply(43));
    }

    #[test]
    fn test_suppress_collisions_replaces_both_occurrences() {
        let mut stream = CipherStream::from_seed(1);
        let mut ciphers = vec![10, 20, 10, 30];
        let collisions = suppress_collisions(&mut ciphers, &mut stream);
        assert_eq!(collisions, 1);
        assert_ne!(ciphers[0], 10);
        assert_ne!(ciphers[2], 10);
        assert_ne!(ciphers[0], ciphers[2]);
        assert_eq!(ciphers[1], 20);
        assert_eq!(ciphers[3], 30);
    }

    #[test]
    fn test_suppress_collisions_is_idempotent() {
        let mut stream = CipherStream::from_seed(2);
        let mut ciphers = vec![5, 5, 5, 6, 7, 6];
        suppress_collisions(&mut ciphers, &mut stream);
        let once = ciphers.clone();
        assert_eq!(suppress_collisions(&mut ciphers, &mut stream), 0);
        assert_eq!(ciphers, once);
    }

    #[test]
    fn test_streams_are_distinct_and_reproducible() {
        let a = CipherStream::for_unit(99, 0).next_cipher();
        let b = CipherStream::for_unit(99, 1).next_cipher();
        let a_again = CipherStream::for_unit(99, 0).next_cipher();
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_reference_segment_keeps_unique_samples() {
        let genome = GenomeTables::from_parts(
            4,
            HashMode::Xxh64,
            vec![11, 12, 13, 14, 15, 16, 17, 0, 0, 0],
            vec![0; 10],
        );
        let contig = ReferenceMatch::new(0, 10);
        let mut out = vec![0; 4];
        let mut stream = CipherStream::from_seed(3);
        let kept = fill_reference_segment(&mut out, &genome, &contig, 4, 3, &mut stream);
        // samples at 0, 3, 6 fall inside the 7 k-mers, 9 is past the end
        assert_eq!(kept, 3);
        assert_eq!(&out[..3], &[11, 14, 17]);
    }

    #[test]
    fn test_reference_segment_suppresses_repeats() {
        // k-mer at 0 repeats at 3, both inside the contig
        let mut repeats = vec![0u16; 10];
        repeats[0] = 3;
        let genome = GenomeTables::from_parts(
            4,
            HashMode::Xxh64,
            vec![11, 12, 13, 11, 15, 16, 17, 0, 0, 0],
            repeats,
        );
        let contig = ReferenceMatch::new(0, 10);
        let mut out = vec![0; 4];
        let mut stream = CipherStream::from_seed(4);
        let kept = fill_reference_segment(&mut out, &genome, &contig, 4, 3, &mut stream);
        assert_eq!(kept, 1);
        assert_ne!(out[0], 11);
        assert_ne!(out[1], 11);
        assert_eq!(out[2], 17);
    }

    #[test]
    fn test_reference_segment_keeps_repeat_beyond_contig() {
        let mut repeats = vec![0u16; 12];
        repeats[0] = 9;
        let genome = GenomeTables::from_parts(
            4,
            HashMode::Xxh64,
            vec![11, 12, 13, 14, 15, 16, 17, 18, 19, 0, 0, 0],
            repeats,
        );
        // contig has 3 k-mers, the repeat 9 positions away lies outside it
        let contig = ReferenceMatch::new(0, 6);
        let mut out = vec![0; 2];
        let mut stream = CipherStream::from_seed(5);
        let kept = fill_reference_segment(&mut out, &genome, &contig, 4, 3, &mut stream);
        assert_eq!(kept, 1);
        assert_eq!(out[0], 11);
    }

    #[test]
    fn test_reference_segment_past_genome_end() {
        let genome = GenomeTables::from_parts(4, HashMode::Xxh64, vec![21, 22, 23, 0, 0, 0], vec![0; 6]);
        let contig = ReferenceMatch::new(3, 10);
        let mut out = vec![0; 4];
        let mut stream = CipherStream::from_seed(6);
        let kept = fill_reference_segment(&mut out, &genome, &contig, 4, 3, &mut stream);
        assert_eq!(kept, 0);
    }
}

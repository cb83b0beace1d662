//! Packed voting tasks
//!
//! A task owns one contiguous cipher buffer laid out as
//! `[read][contig 0][contig 1]...` with an offsets table delimiting the
//! segments: `offsets[0]` is the end of the read segment and
//! `offsets[i + 1]` the end of contig `i`. The read segment is dense
//! (`read_len - k + 1` ciphers), every contig segment is sampled
//! (`ceil(contig_len / sampling_interval)` ciphers).

use rayon::prelude::*;
use std::ops::Range;

use crate::types::{Cipher, Read, Strand};
use crate::utils::{dense_kmer_count, sampled_kmer_count};

#[derive(Debug, Clone)]
pub struct VotingTask {
    data: Vec<Cipher>,
    offsets: Vec<usize>,
    contig_lens: Vec<u16>,
    /// Index of each packed contig in the read's match list (client side only)
    contig_match_ids: Vec<usize>,
    pub read_id: usize,
    pub strand: Strand,
    pub start: usize,
    pub end: usize,
}

impl VotingTask {
    pub fn n_contigs(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn data(&self) -> &[Cipher] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Cipher] {
        &mut self.data
    }

    pub fn data_len(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Size of the buffer shipped to the voting party
    pub fn packed_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<Cipher>()
    }

    pub fn read_segment(&self) -> &[Cipher] {
        &self.data[..self.offsets[0]]
    }

    pub fn read_segment_mut(&mut self) -> &mut [Cipher] {
        let end = self.offsets[0];
        &mut self.data[..end]
    }

    fn contig_range(&self, contig: usize) -> Range<usize> {
        self.offsets[contig]..self.offsets[contig + 1]
    }

    pub fn contig(&self, contig: usize) -> &[Cipher] {
        &self.data[self.contig_range(contig)]
    }

    pub fn contig_mut(&mut self, contig: usize) -> &mut [Cipher] {
        let range = self.contig_range(contig);
        &mut self.data[range]
    }

    /// Original (pre-sampling) length of a packed contig
    pub fn contig_len(&self, contig: usize) -> u16 {
        self.contig_lens[contig]
    }

    pub fn contig_match_id(&self, contig: usize) -> usize {
        self.contig_match_ids[contig]
    }
}

/// Splits reads' candidate lists into bounded tasks
#[derive(Debug, Clone, Copy)]
pub struct TaskBuilder {
    k: usize,
    sampling_interval: usize,
    batch_size: usize,
}

impl TaskBuilder {
    pub fn new(k: usize, sampling_interval: usize, batch_size: usize) -> Self {
        Self {
            k,
            sampling_interval,
            batch_size,
        }
    }

    /// Allocate a task covering `range` of the read's matches.
    ///
    /// Returns `None` when nothing survives filtering, or when the read is too
    /// short to hold a single k-mer.
    pub fn build(
        &self,
        read: &Read,
        read_id: usize,
        strand: Strand,
        range: Range<usize>,
    ) -> Option<VotingTask> {
        let read_kmers = dense_kmer_count(read.len(), self.k);
        if read_kmers == 0 {
            return None;
        }

        let mut offsets = vec![read_kmers];
        let mut contig_lens = Vec::new();
        let mut contig_match_ids = Vec::new();
        let mut total = read_kmers;
        for idx in range.clone() {
            let m = &read.matches[idx];
            if !m.is_usable() {
                continue;
            }
            total += sampled_kmer_count(m.length as usize, self.sampling_interval);
            offsets.push(total);
            contig_lens.push(m.length);
            contig_match_ids.push(idx);
        }

        if offsets.len() == 1 {
            return None;
        }
        debug_assert!(offsets.windows(2).all(|w| w[0] < w[1]));

        Some(VotingTask {
            data: vec![0; total],
            offsets,
            contig_lens,
            contig_match_ids,
            read_id,
            strand,
            start: range.start,
            end: range.end,
        })
    }

    /// Window `range` into consecutive batches of at most `batch_size` matches
    pub fn batches(&self, range: Range<usize>) -> impl Iterator<Item = Range<usize>> {
        let batch_size = self.batch_size;
        let end = range.end;
        range
            .step_by(batch_size)
            .map(move |start| start..(start + batch_size).min(end))
    }

    /// All tasks of one read, forward strand first
    pub fn tasks_for_read(&self, read: &Read, read_id: usize) -> Vec<VotingTask> {
        if dense_kmer_count(read.len(), self.k) == 0 {
            if !read.matches.is_empty() {
                log::warn!(
                    "Read {} is shorter than k={} ({} bases); skipping",
                    read_id,
                    self.k,
                    read.len()
                );
            }
            return Vec::new();
        }

        [Strand::Forward, Strand::ReverseComplement]
            .into_iter()
            .flat_map(|strand| {
                self.batches(read.strand_range(strand))
                    .filter_map(move |batch| self.build(read, read_id, strand, batch))
            })
            .collect()
    }

    /// Tasks for every read, in read order
    pub fn build_all(&self, reads: &[Read]) -> Vec<VotingTask> {
        reads
            .par_iter()
            .enumerate()
            .flat_map_iter(|(read_id, read)| self.tasks_for_read(read, read_id))
            .collect()
    }
}

//! Reduction of per-task voting results into one alignment per read

use serde::{Deserialize, Serialize};

use crate::params::VotingParams;
use crate::types::{AlignmentRecord, GenomicPos, Read};
use crate::voting::{TopTwo, VotingResult};

/// Corpus-wide statistics fed back into confidence scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingStats {
    /// Mean best score over reads with at least one vote
    pub avg_score: f32,
    pub aligned_reads: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultAggregator {
    votes_cutoff: u32,
    confidence_scale: f32,
    enable_scaling: bool,
}

impl ResultAggregator {
    pub fn new(params: &VotingParams) -> Self {
        Self {
            votes_cutoff: params.votes_cutoff,
            confidence_scale: params.confidence_scale,
            enable_scaling: params.enable_scaling,
        }
    }

    /// Shift local offsets by the genomic start of the contig that produced them
    pub fn to_global(result: &VotingResult, read: &Read) -> TopTwo {
        let mut top = result.top;
        for slot in [&mut top.best, &mut top.second] {
            if let Some(candidate) = slot.as_mut() {
                candidate.position += read.matches[candidate.contig].position as i64;
            }
        }
        top
    }

    /// Fold one result into its read's running best/second-best
    pub fn absorb(read: &mut Read, result: &VotingResult) {
        let global = Self::to_global(result, read);
        read.alignment.merge(&global);
    }

    /// Fold every result into its read; arrival order is arbitrary
    pub fn absorb_all(reads: &mut [Read], results: &[VotingResult]) {
        for result in results {
            Self::absorb(&mut reads[result.read_id], result);
        }
    }

    pub fn stats(reads: &[Read]) -> VotingStats {
        let (sum, aligned) = reads
            .iter()
            .map(|r| r.alignment.best_score())
            .filter(|&score| score > 0)
            .fold((0u64, 0usize), |(sum, n), score| (sum + score as u64, n + 1));
        let avg_score = if aligned > 0 {
            sum as f32 / aligned as f32
        } else {
            0.0
        };
        VotingStats {
            avg_score,
            aligned_reads: aligned,
        }
    }

    /// Margin-based confidence; zero unless the best clearly beats the runner-up
    pub fn confidence(&self, top: &TopTwo, stats: &VotingStats) -> f32 {
        let best = top.best_score();
        let second = top.second_score();
        if best <= second || best <= self.votes_cutoff {
            return 0.0;
        }
        let best = best as f32;
        let mut score = self.confidence_scale * (best - second as f32) / best;
        if self.enable_scaling && stats.avg_score > 0.0 {
            score *= best / stats.avg_score;
        }
        score
    }

    /// Final record for one read, or `None` when nothing voted for it
    pub fn finalize_read(&self, read_id: usize, read: &Read, stats: &VotingStats) -> Option<AlignmentRecord> {
        let best = read.alignment.best?;
        let mut start = best.position;
        // RC hits report the read's far end, confident or not
        if best.strand.is_reverse() {
            start += read.len() as i64;
        }
        let global_position = GenomicPos::try_from(start.max(0)).unwrap_or(GenomicPos::MAX);
        Some(AlignmentRecord {
            read_id,
            global_position,
            strand: best.strand,
            confidence_score: self.confidence(&read.alignment, stats),
            best_votes: read.alignment.best_score(),
            second_votes: read.alignment.second_score(),
        })
    }

    pub fn finalize(&self, reads: &[Read], stats: &VotingStats) -> Vec<AlignmentRecord> {
        reads
            .iter()
            .enumerate()
            .filter_map(|(read_id, read)| self.finalize_read(read_id, read, stats))
            .collect()
    }

    /// Absorb all results, compute corpus statistics, then score every read
    pub fn aggregate(&self, reads: &mut [Read], results: &[VotingResult]) -> (Vec<AlignmentRecord>, VotingStats) {
        Self::absorb_all(reads, results);
        let stats = Self::stats(reads);
        log::info!(
            "Aggregated {} results: {} reads aligned, average best score {:.2}",
            results.len(),
            stats.aligned_reads,
            stats.avg_score
        );
        (self.finalize(reads, &stats), stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReferenceMatch, Strand};
    use crate::voting::Candidate;

    fn read_with_contigs(positions: &[u32], n_forward: usize) -> Read {
        let matches = positions.iter().map(|&p| ReferenceMatch::new(p, 50)).collect();
        Read::new(vec![b'A'; 50], matches, n_forward)
    }

    fn result(read_id: usize, strand: Strand, best: Option<(u32, i64, usize)>, second: Option<(u32, i64, usize)>) -> VotingResult {
        let to_candidate = |(score, position, contig): (u32, i64, usize)| Candidate {
            score,
            position,
            contig,
            strand,
        };
        VotingResult {
            read_id,
            strand,
            top: TopTwo {
                best: best.map(to_candidate),
                second: second.map(to_candidate),
            },
        }
    }

    fn params(cutoff: u32, scale: f32, scaling: bool) -> VotingParams {
        VotingParams {
            votes_cutoff: cutoff,
            confidence_scale: scale,
            enable_scaling: scaling,
            ..Default::default()
        }
    }

    #[test]
    fn test_to_global_uses_contig_start() {
        let read = read_with_contigs(&[1000, 7000], 2);
        let r = result(0, Strand::Forward, Some((9, 3, 1)), Some((4, -2, 0)));
        let global = ResultAggregator::to_global(&r, &read);
        assert_eq!(global.best.unwrap().position, 7003);
        assert_eq!(global.second.unwrap().position, 998);
    }

    #[test]
    fn test_reduction_across_strands_and_batches() {
        let mut reads = vec![read_with_contigs(&[1000, 5000, 20_000], 2)];
        let results = vec![
            result(0, Strand::Forward, Some((6, 0, 0)), None),
            result(0, Strand::ReverseComplement, Some((11, 0, 2)), None),
            result(0, Strand::Forward, Some((3, 0, 1)), None),
        ];
        let aggregator = ResultAggregator::new(&params(0, 100.0, false));
        let (records, stats) = aggregator.aggregate(&mut reads, &results);

        assert_eq!(stats.aligned_reads, 1);
        assert_eq!(stats.avg_score, 11.0);
        let record = records[0];
        assert_eq!(record.strand, Strand::ReverseComplement);
        // RC start is shifted by the read length
        assert_eq!(record.global_position, 20_050);
        assert_eq!(record.best_votes, 11);
        assert_eq!(record.second_votes, 6);
        assert!((record.confidence_score - 100.0 * 5.0 / 11.0).abs() < 1e-4);
    }

    #[test]
    fn test_average_excludes_reads_without_votes() {
        let mut reads = vec![
            read_with_contigs(&[0], 1),
            read_with_contigs(&[0], 1),
            read_with_contigs(&[0], 1),
        ];
        let results = vec![
            result(0, Strand::Forward, Some((10, 0, 0)), None),
            result(2, Strand::Forward, Some((20, 0, 0)), None),
        ];
        ResultAggregator::absorb_all(&mut reads, &results);
        let stats = ResultAggregator::stats(&reads);
        assert_eq!(stats.avg_score, 15.0);
        assert_eq!(stats.aligned_reads, 2);
    }

    #[test]
    fn test_average_defaults_to_zero() {
        let reads = vec![read_with_contigs(&[0], 1)];
        assert_eq!(ResultAggregator::stats(&reads), VotingStats::default());
    }

    #[test]
    fn test_confidence_zero_cases() {
        let aggregator = ResultAggregator::new(&params(5, 60.0, false));
        let stats = VotingStats::default();

        let tie = result(0, Strand::Forward, Some((8, 0, 0)), Some((8, 500, 0))).top;
        assert_eq!(aggregator.confidence(&tie, &stats), 0.0);

        let at_cutoff = result(0, Strand::Forward, Some((5, 0, 0)), None).top;
        assert_eq!(aggregator.confidence(&at_cutoff, &stats), 0.0);

        assert_eq!(aggregator.confidence(&TopTwo::default(), &stats), 0.0);
    }

    #[test]
    fn test_confidence_unique_hit_and_scaling() {
        let unique = result(0, Strand::Forward, Some((12, 0, 0)), None).top;

        let plain = ResultAggregator::new(&params(0, 60.0, false));
        let stats = VotingStats {
            avg_score: 6.0,
            aligned_reads: 10,
        };
        assert_eq!(plain.confidence(&unique, &stats), 60.0);

        let scaled = ResultAggregator::new(&params(0, 60.0, true));
        assert_eq!(scaled.confidence(&unique, &stats), 120.0);

        // scaling is skipped when no read voted
        assert_eq!(scaled.confidence(&unique, &VotingStats::default()), 60.0);
    }

    #[test]
    fn test_rc_shift_applies_without_confidence() {
        // both reads tie 8 / 8, so neither earns a confidence score
        let mut reads = vec![read_with_contigs(&[3000, 9000], 0), read_with_contigs(&[3000, 9000], 2)];
        let results = vec![
            result(0, Strand::ReverseComplement, Some((8, 2, 0)), Some((8, 500, 1))),
            result(1, Strand::Forward, Some((8, 2, 0)), Some((8, 500, 1))),
        ];
        let aggregator = ResultAggregator::new(&params(0, 60.0, false));
        let (records, _) = aggregator.aggregate(&mut reads, &results);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].confidence_score, 0.0);
        assert_eq!(records[0].strand, Strand::ReverseComplement);
        assert_eq!(records[0].global_position, 3052);
        assert_eq!(records[1].confidence_score, 0.0);
        assert_eq!(records[1].global_position, 3002);
    }

    #[test]
    fn test_unaligned_reads_have_no_record() {
        let reads = vec![read_with_contigs(&[100], 1)];
        let aggregator = ResultAggregator::new(&params(0, 1.0, false));
        assert!(aggregator.finalize(&reads, &VotingStats::default()).is_empty());
    }
}

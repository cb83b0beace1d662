//! Positional-consensus voting over packed cipher buffers
//!
//! Every contig cipher that also occurs in the read implies an alignment
//! offset `contig_pos - read_pos`. A contig's score is the number of hits
//! agreeing with its dominant offset; hits at inconsistent offsets are
//! outliers and do not count.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::task::VotingTask;
use crate::types::{Cipher, Strand};

/// Candidates closer than this are treated as the same locus
pub const LOCUS_WINDOW: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Inlier votes
    pub score: u32,
    /// Local offset inside the contig during voting, genome coordinate after aggregation
    pub position: i64,
    /// Index into the read's match list
    pub contig: usize,
    pub strand: Strand,
}

/// Best and second-best candidates under the window-aware merge rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTwo {
    pub best: Option<Candidate>,
    pub second: Option<Candidate>,
}

fn same_locus(a: i64, b: i64) -> bool {
    (a - b).abs() <= LOCUS_WINDOW
}

impl TopTwo {
    pub fn best_score(&self) -> u32 {
        self.best.map_or(0, |c| c.score)
    }

    pub fn second_score(&self) -> u32 {
        self.second.map_or(0, |c| c.score)
    }

    /// Offer one candidate.
    ///
    /// A strictly better score takes the best slot; the displaced best only
    /// moves to second when it is outside the window of the newcomer. A
    /// candidate beating just the second slot takes it only when outside the
    /// window of the current best. Note the window is checked against the
    /// current best, so the outcome can depend on arrival order.
    pub fn offer(&mut self, candidate: Candidate) {
        if candidate.score > self.best_score() {
            if let Some(best) = self.best {
                if !same_locus(candidate.position, best.position) {
                    self.second = Some(best);
                }
            }
            self.best = Some(candidate);
        } else if candidate.score > self.second_score() {
            let clear_of_best = self
                .best
                .map_or(true, |best| !same_locus(candidate.position, best.position));
            if clear_of_best {
                self.second = Some(candidate);
            }
        }
    }

    pub fn merge(&mut self, other: &TopTwo) {
        for candidate in [other.best, other.second].into_iter().flatten() {
            self.offer(candidate);
        }
    }
}

/// Voting outcome of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingResult {
    pub read_id: usize,
    pub strand: Strand,
    pub top: TopTwo,
}

/// Count hits around the most populated offset.
///
/// Returns `(inlier votes, dominant offset)`; ties go to the smallest offset.
pub fn dominant_offset(offsets: &mut [i64], tolerance: i64) -> (u32, i64) {
    offsets.sort_unstable();
    let n = offsets.len();
    let (mut lo, mut hi) = (0, 0);
    let mut best = (0u32, 0i64);
    for i in 0..n {
        let center = offsets[i];
        while offsets[lo] < center - tolerance {
            lo += 1;
        }
        while hi < n && offsets[hi] <= center + tolerance {
            hi += 1;
        }
        let count = (hi - lo) as u32;
        if count > best.0 {
            best = (count, center);
        }
    }
    best
}

#[derive(Debug, Clone, Copy)]
pub struct VotingEngine {
    sampling_interval: usize,
    tolerance: i64,
}

impl VotingEngine {
    pub fn new(sampling_interval: usize, tolerance: u32) -> Self {
        Self {
            sampling_interval,
            tolerance: tolerance as i64,
        }
    }

    /// Score every contig of `task` and keep the top two
    pub fn vote(&self, task: &VotingTask) -> VotingResult {
        let read = task.read_segment();
        let mut read_positions: HashMap<Cipher, u32> = HashMap::with_capacity(read.len());
        for (pos, &cipher) in read.iter().enumerate() {
            read_positions.entry(cipher).or_insert(pos as u32);
        }

        let mut top = TopTwo::default();
        let mut offsets = Vec::new();
        for contig in 0..task.n_contigs() {
            offsets.clear();
            for (sample, cipher) in task.contig(contig).iter().enumerate() {
                if let Some(&read_pos) = read_positions.get(cipher) {
                    let contig_pos = (sample * self.sampling_interval) as i64;
                    offsets.push(contig_pos - read_pos as i64);
                }
            }
            let (score, position) = dominant_offset(&mut offsets, self.tolerance);
            log::trace!(
                "read {} {:?} contig {}: {} hits, {} inliers at offset {}",
                task.read_id,
                task.strand,
                contig,
                offsets.len(),
                score,
                position
            );
            if score > 0 {
                top.offer(Candidate {
                    score,
                    position,
                    contig: task.contig_match_id(contig),
                    strand: task.strand,
                });
            }
        }

        VotingResult {
            read_id: task.read_id,
            strand: task.strand,
            top,
        }
    }

    /// Vote on independent tasks in parallel; buffers are released as each finishes
    pub fn run(&self, tasks: Vec<VotingTask>) -> Vec<VotingResult> {
        tasks.into_par_iter().map(|task| self.vote(&task)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskBuilder;
    use crate::types::{Read, ReferenceMatch};

    fn candidate(score: u32, position: i64) -> Candidate {
        Candidate {
            score,
            position,
            contig: 0,
            strand: Strand::Forward,
        }
    }

    #[test]
    fn test_dominant_offset_ignores_outliers() {
        let mut offsets = vec![5, 6, 5, 4, 100, -40, 5];
        assert_eq!(dominant_offset(&mut offsets, 2), (5, 4));
        let mut exact = vec![3, 3, 3, 90];
        assert_eq!(dominant_offset(&mut exact, 0), (3, 3));
        assert_eq!(dominant_offset(&mut Vec::new(), 4), (0, 0));
    }

    #[test]
    fn test_offer_requires_strictly_greater() {
        let mut top = TopTwo::default();
        top.offer(candidate(10, 0));
        top.offer(candidate(10, 10));
        assert_eq!(top.best, Some(candidate(10, 0)));
        assert_eq!(top.second, None);

        top.offer(candidate(10, 500));
        assert_eq!(top.best, Some(candidate(10, 0)));
        assert_eq!(top.second, Some(candidate(10, 500)));
    }

    #[test]
    fn test_displaced_best_moves_to_second_outside_window() {
        let mut top = TopTwo::default();
        top.offer(candidate(5, 100));
        top.offer(candidate(9, 400));
        assert_eq!(top.best, Some(candidate(9, 400)));
        assert_eq!(top.second, Some(candidate(5, 100)));
    }

    #[test]
    fn test_window_keeps_previous_second() {
        let mut top = TopTwo::default();
        top.offer(candidate(4, 1000));
        top.offer(candidate(6, 100));
        assert_eq!(top.second, Some(candidate(4, 1000)));

        // same locus as the best: best moves, second stays
        top.offer(candidate(8, 120));
        assert_eq!(top.best, Some(candidate(8, 120)));
        assert_eq!(top.second, Some(candidate(4, 1000)));

        // would beat second but sits on the best's locus
        top.offer(candidate(7, 130));
        assert_eq!(top.second, Some(candidate(4, 1000)));

        top.offer(candidate(7, 131 + LOCUS_WINDOW));
        assert_eq!(top.second, Some(candidate(7, 131 + LOCUS_WINDOW)));
    }

    #[test]
    fn test_merge_with_self_is_noop() {
        let mut top = TopTwo::default();
        top.offer(candidate(12, 0));
        top.offer(candidate(3, 5000));
        let snapshot = top;
        top.merge(&snapshot);
        assert_eq!(top, snapshot);
    }

    #[test]
    fn test_merge_order_sensitivity_is_preserved() {
        // Far-apart candidates: any order gives the two highest scores
        let far = [candidate(5, 1000), candidate(4, 3000), candidate(9, 5000)];
        let mut forward = TopTwo::default();
        far.iter().for_each(|&c| forward.offer(c));
        let mut backward = TopTwo::default();
        far.iter().rev().for_each(|&c| backward.offer(c));
        assert_eq!(forward, backward);
        assert_eq!(forward.best, Some(far[2]));
        assert_eq!(forward.second, Some(far[0]));

        // The window is checked against whichever candidate holds the best
        // slot at the time, so a runner-up near the final winner survives
        // only when it arrived before the winner.
        let a = candidate(8, 1000);
        let z = candidate(6, 1050);
        let w = candidate(9, 1030);

        let mut early = TopTwo::default();
        for c in [a, z, w] {
            early.offer(c);
        }
        let mut late = TopTwo::default();
        for c in [w, a, z] {
            late.offer(c);
        }
        assert_eq!(early.best, Some(w));
        assert_eq!(late.best, Some(w));
        assert_eq!(early.second, Some(z));
        assert_eq!(late.second, None);
    }

    fn task_with_contigs(read_len: usize, contigs: &[u16]) -> VotingTask {
        let matches: Vec<_> = contigs
            .iter()
            .enumerate()
            .map(|(i, &len)| ReferenceMatch::new(i as u32 * 10_000, len))
            .collect();
        let read = Read::with_strand_matches(vec![b'A'; read_len], matches, Vec::new());
        TaskBuilder::new(4, 2, 16)
            .build(&read, 0, Strand::Forward, 0..contigs.len())
            .unwrap()
    }

    #[test]
    fn test_vote_counts_inliers() {
        // read: 12 k-mers with ciphers 100..112
        let mut task = task_with_contigs(15, &[24, 24]);
        for (i, c) in task.read_segment_mut().iter_mut().enumerate() {
            *c = 100 + i as u64;
        }
        // contig 0: sample j sits at contig pos 2j and matches read pos 2j - 4
        for (j, c) in task.contig_mut(0).iter_mut().enumerate() {
            let read_pos = 2 * j as i64 - 4;
            *c = if (0..12).contains(&read_pos) { 100 + read_pos as u64 } else { 9_000 + j as u64 };
        }
        // contig 1: two scattered hits at unrelated offsets
        for (j, c) in task.contig_mut(1).iter_mut().enumerate() {
            *c = 7_000 + j as u64;
        }
        task.contig_mut(1)[1] = 100;
        task.contig_mut(1)[9] = 103;

        let result = VotingEngine::new(2, 1).vote(&task);
        let best = result.top.best.unwrap();
        assert_eq!(best.score, 6);
        assert_eq!(best.position, 4);
        assert_eq!(best.contig, 0);
        // contig 1's single inlier lands within the locus window of offset 4
        assert_eq!(result.top.second, None);
        assert_eq!(result.read_id, 0);
        assert_eq!(result.strand, Strand::Forward);
    }

    #[test]
    fn test_vote_reports_runner_up_at_distinct_offset() {
        // read: 77 k-mers, contigs: 100 samples each
        let mut task = task_with_contigs(80, &[200, 200]);
        for (i, c) in task.read_segment_mut().iter_mut().enumerate() {
            *c = 1_000 + i as u64;
        }
        for (j, c) in task.contig_mut(0).iter_mut().enumerate() {
            *c = 50_000 + j as u64;
        }
        for (j, c) in task.contig_mut(1).iter_mut().enumerate() {
            *c = 60_000 + j as u64;
        }
        // contig 0: three hits at offset 0
        for read_pos in [0u64, 10, 20] {
            task.contig_mut(0)[read_pos as usize / 2] = 1_000 + read_pos;
        }
        // contig 1: two hits at offset 120
        task.contig_mut(1)[60] = 1_000;
        task.contig_mut(1)[61] = 1_002;

        let result = VotingEngine::new(2, 2).vote(&task);
        assert_eq!(result.top.best.map(|c| (c.score, c.position, c.contig)), Some((3, 0, 0)));
        assert_eq!(result.top.second.map(|c| (c.score, c.position, c.contig)), Some((2, 120, 1)));
    }

    /// Read and contig ciphers that never collide with each other
    fn fill_disjoint(task: &mut VotingTask) {
        for (i, c) in task.read_segment_mut().iter_mut().enumerate() {
            *c = 1_000 + i as u64;
        }
        for contig in 0..task.n_contigs() {
            for (j, c) in task.contig_mut(contig).iter_mut().enumerate() {
                *c = 50_000 + 1_000 * contig as u64 + j as u64;
            }
        }
    }

    #[test]
    fn test_run_returns_one_result_per_task() {
        let mut tasks = vec![task_with_contigs(10, &[10]), task_with_contigs(12, &[8, 8])];
        for task in tasks.iter_mut() {
            fill_disjoint(task);
        }
        // one shared cipher in the second task's second contig
        tasks[1].contig_mut(1)[2] = 1_004;

        let results = VotingEngine::new(2, 1).run(tasks);
        assert_eq!(results.len(), 2);
        assert!(results[0].top.best.is_none());
        let best = results[1].top.best.unwrap();
        assert_eq!((best.score, best.contig), (1, 1));
        assert!(results[1].top.second.is_none());
    }
}

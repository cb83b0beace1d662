//! Phase-two driver: task construction, encryption, voting and aggregation

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::aggregate::{ResultAggregator, VotingStats};
use crate::cipher::{CipherGenerator, CipherStream, FillStats};
use crate::error::{PipelineError, PipelineResult};
use crate::genome::GenomeTables;
use crate::params::{PipelineMode, VotingParams};
use crate::task::{TaskBuilder, VotingTask};
use crate::types::{AlignmentRecord, Read, Strand};
use crate::voting::{VotingEngine, VotingResult};

/// Work and traffic totals of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub tasks: usize,
    pub contigs: usize,
    /// Bytes of packed cipher buffers handed to the voting party
    pub packed_bytes: usize,
    pub kept_samples: usize,
    pub collisions: usize,
    /// Bytes of voting results returned by the voting party
    pub result_bytes: usize,
}

impl PipelineSummary {
    fn record_task(&mut self, task: &VotingTask, fill: FillStats) {
        self.tasks += 1;
        self.contigs += task.n_contigs();
        self.packed_bytes += task.packed_bytes();
        self.kept_samples += fill.kept_samples;
        self.collisions += fill.collisions;
    }

    fn record_results(&mut self, n_results: usize) {
        self.result_bytes += n_results * std::mem::size_of::<VotingResult>();
    }

    fn combined(self, other: Self) -> Self {
        Self {
            tasks: self.tasks + other.tasks,
            contigs: self.contigs + other.contigs,
            packed_bytes: self.packed_bytes + other.packed_bytes,
            kept_samples: self.kept_samples + other.kept_samples,
            collisions: self.collisions + other.collisions,
            result_bytes: self.result_bytes + other.result_bytes,
        }
    }

    pub fn packed_megabytes(&self) -> f64 {
        self.packed_bytes as f64 / 1024.0 / 1024.0
    }

    pub fn result_megabytes(&self) -> f64 {
        self.result_bytes as f64 / 1024.0 / 1024.0
    }
}

#[derive(Debug, Clone)]
pub struct AlignmentReport {
    pub records: Vec<AlignmentRecord>,
    pub stats: VotingStats,
    pub summary: PipelineSummary,
}

pub struct Aligner<'g> {
    params: VotingParams,
    genome: &'g GenomeTables,
    builder: TaskBuilder,
    generator: CipherGenerator,
    engine: VotingEngine,
    aggregator: ResultAggregator,
    run_seed: u64,
}

impl<'g> Aligner<'g> {
    pub fn new(params: VotingParams, genome: &'g GenomeTables) -> PipelineResult<Self> {
        params.validate()?;
        if genome.k() != params.k || genome.hash_mode() != params.hash {
            return Err(PipelineError::TableMismatch {
                table_k: genome.k(),
                table_hash: genome.hash_mode().name().to_string(),
                k: params.k,
                hash: params.hash.name().to_string(),
            });
        }

        let run_seed = params.seed.unwrap_or_else(rand::random);
        Ok(Self {
            builder: TaskBuilder::new(params.k, params.sampling_interval, params.batch_size),
            generator: CipherGenerator::new(params.hash, params.k, params.sampling_interval),
            engine: VotingEngine::new(params.sampling_interval, params.offset_tolerance),
            aggregator: ResultAggregator::new(&params),
            params,
            genome,
            run_seed,
        })
    }

    pub fn params(&self) -> &VotingParams {
        &self.params
    }

    pub fn build_tasks(&self, reads: &[Read]) -> Vec<VotingTask> {
        self.builder.build_all(reads)
    }

    /// Fill and key every task; task `i` draws from its own stream
    pub fn encrypt_tasks(&self, reads: &[Read], tasks: &mut [VotingTask]) -> PipelineSummary {
        tasks
            .par_iter_mut()
            .enumerate()
            .map(|(i, task)| {
                let mut stream = CipherStream::for_unit(self.run_seed, i as u64);
                let read = &reads[task.read_id];
                let fill = self.generator.fill(task, read, self.genome, &mut stream);
                let mut summary = PipelineSummary::default();
                summary.record_task(task, fill);
                summary
            })
            .reduce(PipelineSummary::default, PipelineSummary::combined)
    }

    pub fn align(&self, reads: &mut [Read]) -> AlignmentReport {
        match self.params.mode {
            PipelineMode::Batched => self.align_batched(reads),
            PipelineMode::Monolithic => self.align_monolithic(reads),
        }
    }

    fn align_batched(&self, reads: &mut [Read]) -> AlignmentReport {
        log::info!("Phase 2: contig encryption ({} reads)", reads.len());
        let t = Instant::now();
        let mut tasks = self.build_tasks(reads);
        log::info!("Task allocation: {} tasks in {:.2?}", tasks.len(), t.elapsed());

        let t = Instant::now();
        let mut summary = self.encrypt_tasks(reads, &mut tasks);
        log::info!("Encryption time: {:.2?}", t.elapsed());
        log::info!(
            "Total tasks: {}, contigs: {}, packed size: {:.2} MB, read collisions: {}",
            summary.tasks,
            summary.contigs,
            summary.packed_megabytes(),
            summary.collisions
        );

        log::info!("Phase 2: voting");
        let t = Instant::now();
        let results = self.engine.run(tasks);
        summary.record_results(results.len());
        log::info!(
            "Voting time: {:.2?} ({} results, {:.2} MB)",
            t.elapsed(),
            results.len(),
            summary.result_megabytes()
        );

        let t = Instant::now();
        let (records, stats) = self.aggregator.aggregate(reads, &results);
        log::info!("Post-processing time: {:.2?}", t.elapsed());

        AlignmentReport {
            records,
            stats,
            summary,
        }
    }

    /// Build, encrypt and vote per read in a single pass without a task list
    fn align_monolithic(&self, reads: &mut [Read]) -> AlignmentReport {
        log::info!("Phase 2: single-pass encryption and voting ({} reads)", reads.len());
        let t = Instant::now();
        let summary = reads
            .par_iter_mut()
            .enumerate()
            .map(|(read_id, read)| self.align_read(read_id, read))
            .reduce(PipelineSummary::default, PipelineSummary::combined);
        log::info!(
            "Single pass: {} tasks, {} contigs, {:.2} MB packed, {:.2} MB results in {:.2?}",
            summary.tasks,
            summary.contigs,
            summary.packed_megabytes(),
            summary.result_megabytes(),
            t.elapsed()
        );

        let stats = ResultAggregator::stats(reads);
        log::info!(
            "{} reads aligned, average best score {:.2}",
            stats.aligned_reads,
            stats.avg_score
        );
        AlignmentReport {
            records: self.aggregator.finalize(reads, &stats),
            stats,
            summary,
        }
    }

    /// One key pair per read, one unbatched task per strand
    fn align_read(&self, read_id: usize, read: &mut Read) -> PipelineSummary {
        let mut summary = PipelineSummary::default();
        let mut stream = CipherStream::for_unit(self.run_seed, read_id as u64);
        let keys = stream.key_pair();
        for strand in [Strand::Forward, Strand::ReverseComplement] {
            let range = read.strand_range(strand);
            let Some(mut task) = self.builder.build(read, read_id, strand, range) else {
                continue;
            };
            let fill = self
                .generator
                .fill_with_keys(&mut task, read, self.genome, keys, &mut stream);
            summary.record_task(&task, fill);
            let result = self.engine.vote(&task);
            summary.record_results(1);
            ResultAggregator::absorb(read, &result);
        }
        log::debug!(
            "Read {}: best {} / second {}",
            read_id,
            read.alignment.best_score(),
            read.alignment.second_score()
        );
        summary
    }
}

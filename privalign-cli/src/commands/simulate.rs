//! Simulate command implementation - sample reads, align them, score the result
//!
//! Reads are drawn from a reference (or a random genome), optionally mutated
//! and reverse-complemented. Each read is offered its true locus plus random
//! decoy contigs on both strands, so the run exercises the full voting path
//! and can be checked against the known origin of every read.

use anyhow::{Context, Result};
use clap::Args;
use privalign_core::utils::{encode_nucleotide, reverse_complement};
use privalign_core::{
    Aligner, AlignmentRecord, GenomeTables, PipelineSummary, Read, ReferenceMatch, Strand,
    VotingParams, VotingStats,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{Config, SimulateConfig};
use crate::deterministic::RunSeeds;
use crate::error::CliError;
use crate::{HashArg, ModeArg};

#[derive(Args, Debug, Clone, Default)]
pub struct SimulateArgs {
    /// Reference sequence file to sample from (random genome when omitted)
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Genome tables written by `privalign index` for the same reference
    #[arg(long, requires = "reference")]
    pub tables: Option<PathBuf>,

    /// Random genome length
    #[arg(long)]
    pub genome_len: Option<usize>,

    /// Number of reads to sample
    #[arg(short = 'n', long)]
    pub reads: Option<usize>,

    #[arg(long)]
    pub read_len: Option<usize>,

    /// Decoy contigs per strand
    #[arg(long)]
    pub decoys: Option<usize>,

    /// Per-base substitution probability
    #[arg(long)]
    pub substitution_rate: Option<f64>,

    /// Fraction of reads taken from the reverse strand
    #[arg(long)]
    pub rc_fraction: Option<f64>,

    /// K-mer size
    #[arg(short, long)]
    pub k: Option<usize>,

    #[arg(long)]
    pub sampling_interval: Option<usize>,

    /// Maximum contigs per voting task
    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long, value_enum)]
    pub hash: Option<HashArg>,

    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Base seed for genome, reads and keys
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output file for alignment records (TSV)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Output file for the run summary (JSON)
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

/// Where a simulated read really came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub position: u32,
    pub strand: Strand,
    /// Read k-mers left untouched by substitutions
    pub exact_kmers: u32,
}

impl Origin {
    /// Position an exact alignment reports: RC hits are shifted by the read length
    pub fn expected_position(&self, read_len: usize) -> u32 {
        match self.strand {
            Strand::Forward => self.position,
            Strand::ReverseComplement => self.position + read_len as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Accuracy {
    pub reads: usize,
    pub aligned: usize,
    pub correct: usize,
    /// Reads with a non-zero confidence score
    pub confident: usize,
    pub confident_correct: usize,
}

impl Accuracy {
    pub fn recall(&self) -> f64 {
        ratio(self.correct, self.reads)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.confident_correct, self.confident)
    }
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    params: &'a VotingParams,
    settings: &'a SimulateConfig,
    stats: VotingStats,
    pipeline: PipelineSummary,
    accuracy: Accuracy,
}

pub struct SimulationOutcome {
    pub records: Vec<AlignmentRecord>,
    pub origins: Vec<Origin>,
    pub stats: VotingStats,
    pub summary: PipelineSummary,
    pub accuracy: Accuracy,
}

pub fn execute(config: &Config, deterministic: bool, args: SimulateArgs) -> Result<()> {
    let (settings, mut params) = resolve_settings(config, &args)?;
    let seeds = RunSeeds::resolve(deterministic || config.general.deterministic, args.seed);
    if params.seed.is_none() {
        params.seed = Some(seeds.voting);
    }

    let genome = match &args.reference {
        Some(path) => super::load_genome(path).context("Failed to load reference genome")?,
        None => {
            log::info!("Generating random genome of {} bases", settings.genome_len);
            random_genome(settings.genome_len, &mut StdRng::seed_from_u64(seeds.genome))
        }
    };

    let tables = match &args.tables {
        Some(path) => {
            let tables = GenomeTables::read_from_file(path)
                .with_context(|| format!("Failed to read genome tables: {}", path.display()))?;
            if tables.len() != genome.len() {
                anyhow::bail!(
                    "Genome tables cover {} positions but the reference has {} bases",
                    tables.len(),
                    genome.len()
                );
            }
            tables
        }
        None => {
            let t = Instant::now();
            let tables = GenomeTables::build(&genome, params.k, params.hash);
            log::info!("Genome tables built in {:.2?}", t.elapsed());
            tables
        }
    };

    let outcome = run_simulation(&genome, &tables, params.clone(), &settings, seeds.reads)?;
    let accuracy = outcome.accuracy;
    log::info!(
        "Aligned {}/{} reads, {} correct (recall {:.4}), {} confident (precision {:.4})",
        accuracy.aligned,
        accuracy.reads,
        accuracy.correct,
        accuracy.recall(),
        accuracy.confident,
        accuracy.precision()
    );

    if let Some(path) = &args.out {
        write_records(path, &outcome, &settings)
            .with_context(|| format!("Failed to write alignment records: {}", path.display()))?;
        log::info!("Alignment records written to {}", path.display());
    }

    if let Some(path) = &args.summary {
        let summary = RunSummary {
            params: &params,
            settings: &settings,
            stats: outcome.stats,
            pipeline: outcome.summary,
            accuracy,
        };
        let file = File::create(path)
            .with_context(|| format!("Failed to create summary file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .context("Failed to serialize run summary")?;
        log::info!("Run summary written to {}", path.display());
    }

    Ok(())
}

/// Overlay CLI flags on the configuration file values
fn resolve_settings(config: &Config, args: &SimulateArgs) -> Result<(SimulateConfig, VotingParams)> {
    let mut settings = config.simulate.clone();
    if let Some(v) = args.genome_len { settings.genome_len = v; }
    if let Some(v) = args.reads { settings.n_reads = v; }
    if let Some(v) = args.read_len { settings.read_len = v; }
    if let Some(v) = args.decoys { settings.decoys = v; }
    if let Some(v) = args.substitution_rate { settings.substitution_rate = v; }
    if let Some(v) = args.rc_fraction { settings.rc_fraction = v; }

    for (name, value) in [
        ("substitution_rate", settings.substitution_rate),
        ("rc_fraction", settings.rc_fraction),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(CliError::simulation(format!("{} must be in [0, 1], got {}", name, value)).into());
        }
    }
    if settings.read_len == 0 {
        return Err(CliError::simulation("read_len must be at least 1").into());
    }
    if settings.read_len > u16::MAX as usize {
        return Err(CliError::ReadTooLong {
            read_len: settings.read_len,
            max: u16::MAX as usize,
        }
        .into());
    }

    let mut params = config.voting.clone();
    if let Some(v) = args.k { params.k = v; }
    if let Some(v) = args.sampling_interval { params.sampling_interval = v; }
    if let Some(v) = args.batch_size { params.batch_size = v; }
    if let Some(v) = args.hash { params.hash = v.into(); }
    if let Some(v) = args.mode { params.mode = v.into(); }
    params.validate().context("Invalid voting parameters")?;

    Ok((settings, params))
}

pub fn random_genome<R: Rng>(len: usize, rng: &mut R) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

/// Replace `base` with one of the three other nucleotides
fn substitute<R: Rng>(base: u8, rng: &mut R) -> u8 {
    match encode_nucleotide(base) {
        Some(code) => b"ACGT"[(code as usize + rng.gen_range(1..4)) % 4],
        None => base,
    }
}

/// Number of k-windows containing no substituted base
fn exact_kmers(substituted: &[bool], k: usize) -> u32 {
    if k == 0 || substituted.len() < k {
        return 0;
    }
    substituted.windows(k).filter(|w| !w.contains(&true)).count() as u32
}

/// Sample reads with their true origin; the true contig sits at a random
/// index of its strand's candidate list, among random decoys, and carries
/// the read's exact k-mer count as its diagnostic hit count.
pub fn sample_reads<R: Rng>(
    genome: &[u8],
    settings: &SimulateConfig,
    k: usize,
    rng: &mut R,
) -> Result<(Vec<Read>, Vec<Origin>)> {
    let read_len = settings.read_len;
    if genome.len() < read_len {
        return Err(CliError::GenomeTooShort {
            genome_len: genome.len(),
            read_len,
        }
        .into());
    }
    let max_start = (genome.len() - read_len) as u32;
    let contig_len = read_len as u16;

    let mut reads = Vec::with_capacity(settings.n_reads);
    let mut origins = Vec::with_capacity(settings.n_reads);
    for _ in 0..settings.n_reads {
        let start = rng.gen_range(0..=max_start);
        let mut seq = genome[start as usize..start as usize + read_len].to_vec();
        let mut substituted = vec![false; read_len];
        for (base, hit) in seq.iter_mut().zip(substituted.iter_mut()) {
            if rng.gen_bool(settings.substitution_rate) {
                *base = substitute(*base, rng);
                *hit = true;
            }
        }

        let strand = if rng.gen_bool(settings.rc_fraction) {
            seq = reverse_complement(&seq);
            Strand::ReverseComplement
        } else {
            Strand::Forward
        };

        let mut decoys = |rng: &mut R| -> Vec<ReferenceMatch> {
            (0..settings.decoys)
                .map(|_| ReferenceMatch::new(rng.gen_range(0..=max_start), contig_len))
                .collect()
        };
        let mut forward = decoys(rng);
        let mut reverse = decoys(rng);
        let mut truth = ReferenceMatch::new(start, contig_len);
        truth.diagnostic_hit_count = exact_kmers(&substituted, k);
        let list = match strand {
            Strand::Forward => &mut forward,
            Strand::ReverseComplement => &mut reverse,
        };
        let slot = rng.gen_range(0..=list.len());
        list.insert(slot, truth);

        reads.push(Read::with_strand_matches(seq, forward, reverse));
        origins.push(Origin {
            position: start,
            strand,
            exact_kmers: truth.diagnostic_hit_count,
        });
    }
    Ok((reads, origins))
}

/// A record is correct when its strand matches and it lands within
/// `tolerance` of where an exact alignment would be reported.
pub fn is_correct(record: &AlignmentRecord, origin: &Origin, read_len: usize, tolerance: u32) -> bool {
    record.strand == origin.strand
        && record.global_position.abs_diff(origin.expected_position(read_len)) <= tolerance
}

pub fn evaluate(records: &[AlignmentRecord], origins: &[Origin], read_len: usize, tolerance: u32) -> Accuracy {
    let mut accuracy = Accuracy {
        reads: origins.len(),
        aligned: records.len(),
        ..Default::default()
    };
    for record in records {
        let correct = is_correct(record, &origins[record.read_id], read_len, tolerance);
        let confident = record.confidence_score > 0.0;
        accuracy.correct += correct as usize;
        accuracy.confident += confident as usize;
        accuracy.confident_correct += (confident && correct) as usize;
    }
    accuracy
}

pub fn run_simulation(
    genome: &[u8],
    tables: &GenomeTables,
    params: VotingParams,
    settings: &SimulateConfig,
    reads_seed: u64,
) -> Result<SimulationOutcome> {
    let mut rng = StdRng::seed_from_u64(reads_seed);
    let (mut reads, origins) = sample_reads(genome, settings, params.k, &mut rng)?;
    log::info!(
        "Sampled {} reads of {} bases with {} decoys per strand",
        reads.len(),
        settings.read_len,
        settings.decoys
    );

    let aligner = Aligner::new(params, tables).context("Failed to set up aligner")?;
    let params = aligner.params();
    log::info!(
        "Voting with k={}, s={}, batch={}, hash={}, mode={:?}",
        params.k,
        params.sampling_interval,
        params.batch_size,
        params.hash.name(),
        params.mode
    );
    let report = aligner.align(&mut reads);
    let accuracy = evaluate(&report.records, &origins, settings.read_len, settings.position_tolerance);

    Ok(SimulationOutcome {
        records: report.records,
        origins,
        stats: report.stats,
        summary: report.summary,
        accuracy,
    })
}

fn write_records(path: &Path, outcome: &SimulationOutcome, settings: &SimulateConfig) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(
        writer,
        "read_id\tposition\tstrand\tconfidence\tbest_votes\tsecond_votes\ttrue_position\ttrue_strand\ttrue_hits\tcorrect"
    )?;
    for record in &outcome.records {
        let origin = &outcome.origins[record.read_id];
        writeln!(
            writer,
            "{}\t{}\t{}\t{:.3}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.read_id,
            record.global_position,
            char::from(record.strand),
            record.confidence_score,
            record.best_votes,
            record.second_votes,
            origin.expected_position(settings.read_len),
            char::from(origin.strand),
            origin.exact_kmers,
            is_correct(record, origin, settings.read_len, settings.position_tolerance) as u8
        )?;
    }
    writer.flush()?;
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use privalign_core::{HashMode, PipelineMode};
use std::path::PathBuf;

mod commands;
mod config;
mod deterministic;
mod error;

use commands::simulate::SimulateArgs;
use config::Config;

#[derive(Parser)]
#[command(name = "privalign")]
#[command(about = "privalign - privacy-preserving short-read alignment by encrypted k-mer voting")]
#[command(version)]
#[command(long_about = "
privalign aligns short reads against candidate reference intervals by comparing
keyed k-mer hashes only. The party that votes never sees a nucleotide.

Examples:
  privalign index --reference genome.fa --out genome.pvgt -k 20
  privalign simulate --reference genome.fa --tables genome.pvgt -n 100000 --out hits.tsv
  privalign simulate --genome-len 5000000 --substitution-rate 0.02 --summary run.json
  privalign config > privalign.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable deterministic mode for reproducible results
    #[arg(long, global = true)]
    pub deterministic: bool,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Precompute k-mer hash and repeat tables for a reference genome
    Index {
        /// Reference sequence file (FASTA/FASTQ)
        #[arg(long, required = true)]
        reference: PathBuf,

        /// Output tables file
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// K-mer size
        #[arg(short, long)]
        k: Option<usize>,

        /// K-mer hash function
        #[arg(long, value_enum)]
        hash: Option<HashArg>,
    },

    /// Sample reads from a genome, align them and report accuracy
    Simulate(SimulateArgs),

    /// Print an example configuration file
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum HashArg {
    Sha256,
    Xxh64,
}

impl From<HashArg> for HashMode {
    fn from(arg: HashArg) -> Self {
        match arg {
            HashArg::Sha256 => HashMode::Sha256,
            HashArg::Xxh64 => HashMode::Xxh64,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Batched,
    Monolithic,
}

impl From<ModeArg> for PipelineMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Batched => PipelineMode::Batched,
            ModeArg::Monolithic => PipelineMode::Monolithic,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet)?;

    let config = Config::load(cli.config.as_deref())?;

    // CLI flag wins over the configured default
    let threads = cli.threads.unwrap_or(config.general.threads);
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set thread count")?;
        log::debug!("Using {} worker threads", threads);
    }

    match cli.command {
        Commands::Index {
            reference,
            out,
            k,
            hash,
        } => {
            commands::index::execute(&config, reference, out, k, hash.map(Into::into))?;
        }

        Commands::Simulate(args) => {
            commands::simulate::execute(&config, cli.deterministic, args)?;
        }

        Commands::Config { out } => match out {
            Some(path) => {
                config.save_to_file(&path)?;
                log::info!("Configuration written to {}", path.display());
            }
            None => print!("{}", Config::example_toml()?),
        },
    }

    Ok(())
}

//! Configuration handling for the privalign CLI
//!
//! Supports loading configuration from privalign.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use privalign_core::VotingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub voting: VotingParams,
    #[serde(default)]
    pub simulate: SimulateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Fix every seed so repeated runs produce identical output
    #[serde(default)]
    pub deterministic: bool,

    /// Default number of threads to use
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateConfig {
    /// Length of the random genome when no reference is given
    #[serde(default = "default_genome_len")]
    pub genome_len: usize,

    #[serde(default = "default_n_reads")]
    pub n_reads: usize,

    #[serde(default = "default_read_len")]
    pub read_len: usize,

    /// Random candidates offered next to the true locus, per strand
    #[serde(default = "default_decoys")]
    pub decoys: usize,

    /// Per-base substitution probability applied to sampled reads
    #[serde(default = "default_substitution_rate")]
    pub substitution_rate: f64,

    /// Fraction of reads sampled from the reverse strand
    #[serde(default = "default_rc_fraction")]
    pub rc_fraction: f64,

    /// Slack around the true origin still counted as a correct alignment
    #[serde(default = "default_position_tolerance")]
    pub position_tolerance: u32,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_genome_len() -> usize { 1_000_000 }
fn default_n_reads() -> usize { 10_000 }
fn default_read_len() -> usize { 150 }
fn default_decoys() -> usize { 15 }
fn default_substitution_rate() -> f64 { 0.01 }
fn default_rc_fraction() -> f64 { 0.5 }
fn default_position_tolerance() -> u32 { 30 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            deterministic: false,
            threads: default_threads(),
        }
    }
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            genome_len: default_genome_len(),
            n_reads: default_n_reads(),
            read_len: default_read_len(),
            decoys: default_decoys(),
            substitution_rate: default_substitution_rate(),
            rc_fraction: default_rc_fraction(),
            position_tolerance: default_position_tolerance(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("privalign.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: privalign.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::info!("Using default configuration");
                    Self::default()
                }
            }
        };

        config
            .voting
            .validate()
            .context("Invalid [voting] section")?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }
}

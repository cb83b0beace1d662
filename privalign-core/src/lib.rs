//! privalign core library
//!
//! Encrypted k-mer generation, packed voting tasks, positional-consensus
//! voting and per-read aggregation for privacy-preserving read alignment.

pub mod types;
pub mod error;
pub mod params;
pub mod utils;
pub mod cipher;
pub mod genome;
pub mod task;
pub mod voting;
pub mod aggregate;
pub mod pipeline;

// Re-export commonly used types and functions
pub use types::{AlignmentRecord, Cipher, GenomicPos, Read, ReferenceMatch, Strand};
pub use error::{PipelineError, PipelineResult};
pub use params::{HashMode, PipelineMode, VotingParams};
pub use cipher::{CipherGenerator, CipherStream, KeyPair, KmerHasher};
pub use genome::GenomeTables;
pub use task::{TaskBuilder, VotingTask};
pub use voting::{Candidate, TopTwo, VotingEngine, VotingResult, LOCUS_WINDOW};
pub use aggregate::{ResultAggregator, VotingStats};
pub use pipeline::{Aligner, AlignmentReport, PipelineSummary};

/// Version information for the privalign core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

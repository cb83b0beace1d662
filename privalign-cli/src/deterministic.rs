//! Deterministic mode support for reproducible runs

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Base seed used whenever deterministic mode is on
pub const BASE_SEED: u64 = 42;

/// Derive a reproducible seed for one component of a run.
///
/// Different components get different but stable seeds from the same base.
pub fn component_seed(base: u64, component: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    component.hash(&mut hasher);
    base.hash(&mut hasher);
    hasher.finish()
}

/// Seeds for one simulation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSeeds {
    pub genome: u64,
    pub reads: u64,
    pub voting: u64,
}

impl RunSeeds {
    pub fn from_base(base: u64) -> Self {
        Self {
            genome: component_seed(base, "genome"),
            reads: component_seed(base, "reads"),
            voting: component_seed(base, "voting"),
        }
    }

    /// Fixed seeds in deterministic mode, fresh entropy otherwise
    pub fn resolve(deterministic: bool, explicit: Option<u64>) -> Self {
        match (explicit, deterministic) {
            (Some(base), _) => Self::from_base(base),
            (None, true) => {
                log::info!("Deterministic mode: deriving seeds from base seed {}", BASE_SEED);
                Self::from_base(BASE_SEED)
            }
            (None, false) => Self::from_base(rand::random()),
        }
    }
}

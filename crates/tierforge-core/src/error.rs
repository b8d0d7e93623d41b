//! Error types for taxonomy loading and invariant checks

use thiserror::Error;

use crate::components::Tier;

/// Errors raised while loading or validating a taxonomy
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy must define at least one tier")]
    NoTiers,
    #[error("taxonomy defines {0} tiers, at most 255 are supported")]
    TooManyTiers(usize),
    #[error("group threshold must be at least 2, got {0}")]
    GroupThresholdTooSmall(u32),
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f32 },
    #[error("{name} must be finite and not negative, got {value}")]
    Negative { name: &'static str, value: f32 },
    #[error("velocity retention must be within 0..=1, got {0}")]
    RetentionOutOfRange(f32),
    #[error("burst speed range {min}..{max} is not a finite, non-negative range")]
    InvalidBurstSpeed { min: f32, max: f32 },
    #[error("population cap {cap} is below the performance threshold {threshold}")]
    CapBelowThreshold { cap: usize, threshold: usize },
    #[error("tier names must be unique, '{0}' appears twice")]
    DuplicateTierName(String),
    #[error("taxonomy JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Violations of the engine's single-owner invariant
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("particle {entity:?} is claimed by {jobs} active jobs")]
    SharedParticle { entity: hecs::Entity, jobs: usize },
    #[error("particle {entity:?} of tier {tier:?} is marked merging but no job owns it")]
    OrphanedParticle { entity: hecs::Entity, tier: Tier },
    #[error("job {job} owns particle {entity:?} which is not marked merging")]
    UnclaimedParticle { job: u64, entity: hecs::Entity },
}

//! Read-only, serializable view of engine state for UI and debugging

use serde::{Deserialize, Serialize};

use crate::components::{SizeClass, Tier, Vec2};
use crate::engine::{EngineToggles, MergeEngine, MergeStats};
use crate::systems::{Inventory, JobKind, MergeJob};

/// In-flight job without entity handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: u64,
    pub kind: JobKind,
    pub particle_count: usize,
    pub target: Vec2,
    pub result_tier: Tier,
    pub result_size: SizeClass,
    pub started_at: f64,
}

impl From<&MergeJob> for JobSummary {
    fn from(job: &MergeJob) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            particle_count: job.particles.len(),
            target: job.target,
            result_tier: job.result_tier,
            result_size: job.result_size,
            started_at: job.started_at,
        }
    }
}

/// Per-tier population, one count per size class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPopulation {
    pub tier: Tier,
    pub name: String,
    pub unlocked: bool,
    /// Indexed by `SizeClass::index()`
    pub by_size: [usize; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub tick: u64,
    pub sim_time: f64,
    pub particle_count: usize,
    pub toggles: EngineToggles,
    pub inventory: Inventory,
    pub tiers: Vec<TierPopulation>,
    pub jobs: Vec<JobSummary>,
    pub pending_shockwaves: usize,
    pub stats: MergeStats,
}

impl EngineSnapshot {
    pub fn from_engine(engine: &MergeEngine) -> Self {
        let taxonomy = engine.taxonomy();
        let tiers = taxonomy
            .tier_ids()
            .map(|tier| {
                let mut by_size = [0; 4];
                for size in SizeClass::ALL {
                    by_size[size.index() as usize] = engine.count_particles(tier, size);
                }
                TierPopulation {
                    tier,
                    name: taxonomy
                        .tier(tier)
                        .map(|t| t.name.clone())
                        .unwrap_or_default(),
                    unlocked: engine.is_unlocked(tier),
                    by_size,
                }
            })
            .collect();

        Self {
            tick: engine.current_tick(),
            sim_time: engine.sim_time(),
            particle_count: engine.particle_count(),
            toggles: engine.toggles(),
            inventory: engine.inventory().clone(),
            tiers,
            jobs: engine.active_jobs().iter().map(JobSummary::from).collect(),
            pending_shockwaves: engine.pending_shockwaves(),
            stats: engine.stats(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

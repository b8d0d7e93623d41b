//! Merge engine - main entry point for running the particle simulation

use std::collections::HashMap;

use hecs::{Entity, World};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::error::{EngineError, TaxonomyError};
use crate::snapshot::EngineSnapshot;
use crate::systems::*;
use crate::taxonomy::Taxonomy;

/// Switches supplied by the surrounding game state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineToggles {
    /// Same-size merges at generator anchors
    pub merging_enabled: bool,
    /// Forge promotions and bulk compression
    pub promotion_enabled: bool,
    /// Crunch window; forge promotions only fire while this is set
    pub crunch_active: bool,
    /// Enqueue shockwaves for completed size merges
    pub shockwaves_enabled: bool,
}

impl Default for EngineToggles {
    fn default() -> Self {
        Self {
            merging_enabled: true,
            promotion_enabled: false,
            crunch_active: false,
            shockwaves_enabled: true,
        }
    }
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub size_merges: u64,
    pub forge_promotions: u64,
    pub bulk_compressions: u64,
    pub collapsed_conversions: u64,
    pub governor_conversions: u64,
    pub timeouts: u64,
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Kind of job started this tick, if any
    pub started: Option<JobKind>,
    /// Jobs finished this tick
    pub completed: Vec<CompletedJob>,
    /// Set when the governor ran this tick
    pub governor: Option<GovernorReport>,
}

/// Main merge engine. Owns the particle world, the job slot and every
/// record the collaborators read back.
pub struct MergeEngine {
    /// ECS world holding only particle entities
    world: World,
    taxonomy: Taxonomy,
    toggles: EngineToggles,
    tracker: MergeTracker,
    unlocks: UnlockRegistry,
    shockwaves: ShockwaveQueue,
    inventory: Inventory,
    inventory_dirty: bool,
    stats: MergeStats,
    rng: StdRng,
    sim_time: f64,
    tick: u64,
}

impl MergeEngine {
    /// Create an engine seeded from OS entropy
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self::from_rng(taxonomy, StdRng::from_entropy())
    }

    /// Create an engine with a fixed seed, for replays and tests
    pub fn with_seed(taxonomy: Taxonomy, seed: u64) -> Self {
        Self::from_rng(taxonomy, StdRng::seed_from_u64(seed))
    }

    /// Validate the taxonomy before building the engine
    pub fn try_new(taxonomy: Taxonomy) -> Result<Self, TaxonomyError> {
        taxonomy.validate()?;
        Ok(Self::new(taxonomy))
    }

    fn from_rng(taxonomy: Taxonomy, rng: StdRng) -> Self {
        if let Err(e) = taxonomy.validate() {
            warn!("merge engine built from an invalid taxonomy: {}", e);
        }
        let inventory = Inventory::new(taxonomy.tier_count());
        let unlocks = Self::initial_unlocks(&taxonomy);
        Self {
            world: World::new(),
            taxonomy,
            toggles: EngineToggles::default(),
            tracker: MergeTracker::new(),
            unlocks,
            shockwaves: ShockwaveQueue::new(),
            inventory,
            inventory_dirty: false,
            stats: MergeStats::default(),
            rng,
            sim_time: 0.0,
            tick: 0,
        }
    }

    fn initial_unlocks(taxonomy: &Taxonomy) -> UnlockRegistry {
        UnlockRegistry::with_unlocked(taxonomy.tier_ids().take(1))
    }

    /// Drop every particle, job and side record. Keeps taxonomy, toggles
    /// and the RNG stream.
    pub fn reset(&mut self) {
        self.world.clear();
        self.tracker.clear();
        self.unlocks = Self::initial_unlocks(&self.taxonomy);
        self.shockwaves.clear();
        self.inventory = Inventory::new(self.taxonomy.tier_count());
        self.inventory_dirty = false;
        self.stats = MergeStats::default();
        self.sim_time = 0.0;
        self.tick = 0;
    }

    // ── Toggles ─────────────────────────────────────────────────────────

    pub fn toggles(&self) -> EngineToggles {
        self.toggles
    }

    pub fn set_toggles(&mut self, toggles: EngineToggles) {
        self.toggles = toggles;
    }

    pub fn set_merging_enabled(&mut self, enabled: bool) {
        self.toggles.merging_enabled = enabled;
    }

    pub fn set_promotion_enabled(&mut self, enabled: bool) {
        self.toggles.promotion_enabled = enabled;
    }

    pub fn set_crunch_active(&mut self, active: bool) {
        self.toggles.crunch_active = active;
    }

    pub fn set_shockwaves_enabled(&mut self, enabled: bool) {
        self.toggles.shockwaves_enabled = enabled;
    }

    // ── Population ──────────────────────────────────────────────────────

    /// Add a particle. Returns `None` at the population cap or for a tier
    /// the taxonomy does not know.
    pub fn spawn_particle(
        &mut self,
        tier: Tier,
        size: SizeClass,
        position: Vec2,
    ) -> Option<Entity> {
        if self.taxonomy.tier(tier).is_none()
            || self.particle_count() >= self.taxonomy.tuning.population_cap
        {
            return None;
        }
        self.inventory_dirty = true;
        Some(
            self.world
                .spawn((Particle::new(tier, size), Position(position), Velocity::default())),
        )
    }

    /// Add a particle near a tier's generator anchor
    pub fn spawn_at_generator(&mut self, tier: Tier, size: SizeClass) -> Option<Entity> {
        let anchor = self.taxonomy.generator(tier)?;
        let jitter = self.taxonomy.tuning.spawn_jitter;
        let offset = if jitter.is_finite() && jitter > 0.0 {
            Vec2::new(
                self.rng.gen_range(-jitter..jitter),
                self.rng.gen_range(-jitter..jitter),
            )
        } else {
            Vec2::ZERO
        };
        self.spawn_particle(tier, size, anchor + offset)
    }

    /// Remove a particle from outside the engine. A job that owned it
    /// simply completes without it.
    pub fn despawn_particle(&mut self, entity: Entity) -> bool {
        let removed = self.world.despawn(entity).is_ok();
        if removed {
            self.inventory_dirty = true;
        }
        removed
    }

    pub fn particle_count(&self) -> usize {
        self.world.len() as usize
    }

    /// Count particles of one tier and size class
    pub fn count_particles(&self, tier: Tier, size: SizeClass) -> usize {
        self.world
            .query::<&Particle>()
            .iter()
            .filter(|(_, p)| p.tier == tier && p.size == size)
            .count()
    }

    // ── Simulation ──────────────────────────────────────────────────────

    /// Run one simulation tick.
    ///
    /// Order: governor (when over the performance threshold), then one
    /// selector attempt if the population is under the threshold, then job
    /// progress, then a single inventory recompute if anything changed.
    pub fn tick(&mut self, delta_seconds: f64) -> TickReport {
        self.sim_time += delta_seconds.max(0.0);
        self.tick += 1;
        let now = self.sim_time;

        let mut report = TickReport::default();
        let cooling_down = self.tracker.consume_cooldown();

        if governor_triggered(&self.world, &self.taxonomy) {
            let governor = run_governor(&mut self.world, &self.taxonomy);
            if governor.conversions > 0 {
                self.inventory_dirty = true;
                self.stats.governor_conversions += governor.conversions as u64;
            }
            report.governor = Some(governor);
        }

        // Selectors only run once the population is back under the ceiling
        if !cooling_down && !governor_triggered(&self.world, &self.taxonomy) {
            report.started = self.try_start_job(now);
        }

        let completed = progress_jobs(
            &mut self.world,
            &self.taxonomy,
            &mut self.tracker,
            &mut self.unlocks,
            &mut self.shockwaves,
            self.toggles.shockwaves_enabled,
            &mut self.rng,
            now,
        );
        if !completed.is_empty() {
            self.inventory_dirty = true;
            for job in &completed {
                self.record_completion(job);
            }
        }
        report.completed = completed;

        if self.inventory_dirty {
            self.refresh_inventory();
        }

        debug_assert!(self.check_ownership().is_ok());
        report
    }

    /// Selectors in priority order; the first to start a job wins
    fn try_start_job(&mut self, now: f64) -> Option<JobKind> {
        if !self.tracker.is_idle() {
            return None;
        }
        let toggles = self.toggles;
        let world = &mut self.world;
        let taxonomy = &self.taxonomy;
        let tracker = &mut self.tracker;
        let rng = &mut self.rng;

        let started = (toggles.merging_enabled
            && select_size_merge(world, taxonomy, tracker, rng, now).is_some())
            || (toggles.promotion_enabled
                && toggles.crunch_active
                && select_forge_promotion(world, taxonomy, tracker, rng, now).is_some())
            || (toggles.promotion_enabled
                && select_bulk_compression(world, taxonomy, tracker, rng, now).is_some());

        if started {
            self.tracker.jobs().last().map(|job| job.kind)
        } else {
            None
        }
    }

    fn record_completion(&mut self, job: &CompletedJob) {
        // Forge promotions always target Medium, bulk compressions the max size
        match job.kind {
            JobKind::SizeMerge => self.stats.size_merges += 1,
            JobKind::TierConversion { .. } if job.result_size == SizeClass::Medium => {
                self.stats.forge_promotions += 1
            }
            JobKind::TierConversion { .. } => self.stats.bulk_compressions += 1,
        }
        if job.collapsed {
            self.stats.collapsed_conversions += 1;
        }
        if job.timed_out {
            self.stats.timeouts += 1;
        }
    }

    /// Move particles: merging ones toward their target, free ones along
    /// their velocity. Hosts with their own movement code can skip this.
    pub fn advance_motion(&mut self, delta_seconds: f32) {
        steering_system(&mut self.world, &self.taxonomy.tuning, delta_seconds);
    }

    /// Recompute the published inventory now
    pub fn refresh_inventory(&mut self) {
        self.inventory = recompute_inventory(&self.world, &self.taxonomy);
        self.inventory_dirty = false;
    }

    // ── Invariants ──────────────────────────────────────────────────────

    /// Verify that every merging particle belongs to exactly one job and
    /// every live job particle is marked merging
    pub fn check_ownership(&self) -> Result<(), EngineError> {
        let mut owners: HashMap<Entity, usize> = HashMap::new();
        for job in self.tracker.jobs() {
            for &entity in &job.particles {
                *owners.entry(entity).or_default() += 1;
                if let Ok(particle) = self.world.get::<&Particle>(entity) {
                    if !particle.merging {
                        return Err(EngineError::UnclaimedParticle { job: job.id, entity });
                    }
                }
            }
        }
        if let Some((&entity, &jobs)) = owners.iter().find(|(_, jobs)| **jobs > 1) {
            return Err(EngineError::SharedParticle { entity, jobs });
        }
        for (entity, particle) in self.world.query::<&Particle>().iter() {
            if particle.merging && !owners.contains_key(&entity) {
                return Err(EngineError::OrphanedParticle {
                    entity,
                    tier: particle.tier,
                });
            }
        }
        Ok(())
    }

    // ── Outputs ─────────────────────────────────────────────────────────

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn unlocks(&self) -> &UnlockRegistry {
        &self.unlocks
    }

    pub fn is_unlocked(&self, tier: Tier) -> bool {
        self.unlocks.is_unlocked(tier)
    }

    /// Fade-in opacity for a tier at the current sim time
    pub fn fade_in_alpha(&self, tier: Tier) -> f32 {
        self.unlocks
            .fade_in_alpha(tier, self.sim_time, self.taxonomy.tuning.fade_in_duration)
    }

    /// Hand pending shockwaves to the renderer
    pub fn drain_shockwaves(&mut self) -> Vec<Shockwave> {
        self.shockwaves.drain()
    }

    pub fn pending_shockwaves(&self) -> usize {
        self.shockwaves.len()
    }

    pub fn active_jobs(&self) -> &[MergeJob] {
        self.tracker.jobs()
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Read access for movement and render collaborators
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access for host movement code. Hosts must not touch the
    /// `merging` flag of particles.
    pub fn world_mut(&mut self) -> &mut World {
        self.inventory_dirty = true;
        &mut self.world
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::from_engine(self)
    }

    pub fn snapshot_json(&self) -> String {
        self.snapshot().to_json().unwrap_or_else(|e| {
            debug!("snapshot serialization failed: {}", e);
            "{}".to_string()
        })
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new(Taxonomy::default())
    }
}

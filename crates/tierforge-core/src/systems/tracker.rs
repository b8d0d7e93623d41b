//! Active merge tracker - advances in-flight jobs and completes them
//!
//! A job owns a set of particles heading for a shared target. It completes
//! once every owned particle has gathered at the target, or when it times
//! out; both paths produce identical output.

use hecs::{Entity, World};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::effects::{Shockwave, ShockwaveQueue, UnlockRegistry};
use crate::components::{Particle, Position, SizeClass, Tier, Vec2, Velocity};
use crate::taxonomy::Taxonomy;

/// What a job produces when it completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// Group of one size class becomes one particle of the next size
    SizeMerge,
    /// Particles become `count` particles of another tier
    TierConversion { count: u32 },
}

/// An in-flight merge or conversion
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub id: u64,
    pub particles: Vec<Entity>,
    pub target: Vec2,
    pub result_tier: Tier,
    pub result_size: SizeClass,
    /// Sim time the job was created
    pub started_at: f64,
    pub kind: JobKind,
}

/// Summary of a finished job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedJob {
    pub id: u64,
    pub kind: JobKind,
    pub result_tier: Tier,
    pub result_size: SizeClass,
    pub consumed: usize,
    pub created: usize,
    pub timed_out: bool,
    /// Output collapsed to one Medium particle under performance pressure
    pub collapsed: bool,
    /// This completion unlocked `result_tier`
    pub unlocked: bool,
}

/// Jobs in flight plus the post-completion cooldown
#[derive(Debug, Clone, Default)]
pub struct MergeTracker {
    jobs: Vec<MergeJob>,
    next_id: u64,
    cooldown_ticks: u32,
}

impl MergeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[MergeJob] {
        &self.jobs
    }

    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }

    /// Selectors may only start a job when nothing is in flight
    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Consume one tick of cooldown. Returns true if selectors must wait.
    pub fn consume_cooldown(&mut self) -> bool {
        if self.cooldown_ticks > 0 {
            self.cooldown_ticks -= 1;
            true
        } else {
            false
        }
    }

    pub fn cooldown_pending(&self) -> bool {
        self.cooldown_ticks > 0
    }

    /// Register a new job over already-claimed particles
    pub fn start_job(
        &mut self,
        particles: Vec<Entity>,
        target: Vec2,
        result_tier: Tier,
        result_size: SizeClass,
        kind: JobKind,
        now: f64,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "job {} started: {:?} of {} particles -> tier {:?} {:?}",
            id,
            kind,
            particles.len(),
            result_tier,
            result_size
        );
        self.jobs.push(MergeJob {
            id,
            particles,
            target,
            result_tier,
            result_size,
            started_at: now,
            kind,
        });
        id
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.cooldown_ticks = 0;
    }
}

/// Whether every live particle of `job` sits within the gather distance.
/// Particles removed by outside cleanup count as gathered.
fn is_gathered(world: &World, job: &MergeJob, gather_distance: f32) -> bool {
    let limit = gather_distance * gather_distance;
    job.particles.iter().all(|&entity| match world.get::<&Position>(entity) {
        Ok(pos) => pos.0.distance_squared(&job.target) < limit,
        Err(_) => true,
    })
}

/// Spawn a fresh, unclaimed particle
pub(crate) fn spawn_particle(
    world: &mut World,
    tier: Tier,
    size: SizeClass,
    position: Vec2,
    velocity: Vec2,
) -> Entity {
    world.spawn((Particle::new(tier, size), Position(position), Velocity(velocity)))
}

/// Clamp a job's output to the room left under the population cap
fn capped_output(job: &MergeJob, wanted: usize, room: usize, cap: usize) -> usize {
    let n = wanted.min(room);
    if n < wanted {
        warn!(
            "job {} truncated to {} of {} particles by population cap {}",
            job.id, n, wanted, cap
        );
    }
    n
}

/// Advance every active job and complete those that gathered or timed out.
///
/// Consumed particles of all finished jobs are removed in one batch before
/// any result is created. Arms the one-tick cooldown when anything finished.
#[allow(clippy::too_many_arguments)]
pub fn progress_jobs<R: Rng + ?Sized>(
    world: &mut World,
    taxonomy: &Taxonomy,
    tracker: &mut MergeTracker,
    unlocks: &mut UnlockRegistry,
    shockwaves: &mut ShockwaveQueue,
    shockwaves_enabled: bool,
    rng: &mut R,
    now: f64,
) -> Vec<CompletedJob> {
    let tuning = &taxonomy.tuning;
    if tracker.jobs.is_empty() {
        return Vec::new();
    }

    let mut finished: Vec<(MergeJob, bool)> = Vec::new();
    for job in std::mem::take(&mut tracker.jobs) {
        let timed_out = now - job.started_at > tuning.job_timeout;
        if timed_out || is_gathered(world, &job, tuning.gather_distance) {
            finished.push((job, timed_out));
        } else {
            tracker.jobs.push(job);
        }
    }

    if finished.is_empty() {
        return Vec::new();
    }

    // Batch removal of everything the finished jobs consumed
    let mut consumed_counts = Vec::with_capacity(finished.len());
    for (job, _) in &finished {
        let mut consumed = 0;
        for &entity in &job.particles {
            if world.despawn(entity).is_ok() {
                consumed += 1;
            }
        }
        consumed_counts.push(consumed);
    }

    let mut completed = Vec::with_capacity(finished.len());
    for ((job, timed_out), consumed) in finished.into_iter().zip(consumed_counts) {
        let population = world.len() as usize;
        let room = tuning.population_cap.saturating_sub(population);
        let mut collapsed = false;

        let created = if consumed == 0 {
            // Everything it owned was removed from outside; nothing to convert
            warn!("job {} lost all its particles, no result created", job.id);
            0
        } else {
            match job.kind {
                JobKind::TierConversion { count } => {
                    if population > tuning.performance_threshold
                        && count == tuning.collapse_conversion_count
                    {
                        collapsed = true;
                        let n = capped_output(&job, 1, room, tuning.population_cap);
                        if n > 0 {
                            spawn_particle(
                                world,
                                job.result_tier,
                                SizeClass::Medium,
                                job.target,
                                Vec2::ZERO,
                            );
                        }
                        n
                    } else {
                        let n = capped_output(&job, count as usize, room, tuning.population_cap);
                        let (min_speed, max_speed) = tuning.burst_speed;
                        for _ in 0..n {
                            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                            let speed = if min_speed.is_finite()
                                && max_speed.is_finite()
                                && max_speed > min_speed
                            {
                                rng.gen_range(min_speed..max_speed)
                            } else if min_speed.is_finite() {
                                min_speed
                            } else {
                                0.0
                            };
                            let velocity = Vec2::from_angle(angle) * speed;
                            spawn_particle(
                                world,
                                job.result_tier,
                                job.result_size,
                                job.target,
                                velocity,
                            );
                        }
                        n
                    }
                }
                JobKind::SizeMerge => {
                    let n = capped_output(&job, 1, room, tuning.population_cap);
                    if n > 0 {
                        spawn_particle(
                            world,
                            job.result_tier,
                            job.result_size,
                            job.target,
                            Vec2::ZERO,
                        );
                    }
                    n
                }
            }
        };

        // A job that produced nothing neither unlocks nor shockwaves
        let unlocked = created > 0 && unlocks.unlock(job.result_tier, now);
        if unlocked {
            let name = taxonomy
                .tier(job.result_tier)
                .map(|t| t.name.as_str())
                .unwrap_or("?");
            info!("tier '{}' unlocked", name);
        }

        if created > 0 && job.kind == JobKind::SizeMerge && shockwaves_enabled {
            shockwaves.push(Shockwave {
                position: job.target,
                started_at: now,
                color: taxonomy.color(job.result_tier),
                tier: job.result_tier,
            });
        }

        debug!(
            "job {} complete ({}): consumed {}, created {}",
            job.id,
            if timed_out { "timeout" } else { "gathered" },
            consumed,
            created
        );

        completed.push(CompletedJob {
            id: job.id,
            kind: job.kind,
            result_tier: job.result_tier,
            result_size: job.result_size,
            consumed,
            created,
            timed_out,
            collapsed,
            unlocked,
        });
    }

    tracker.cooldown_ticks = 1;
    completed
}

//! Same-size merge selector - starts the animated group merges at each
//! tier's generator anchor

use hecs::World;
use rand::seq::SliceRandom;
use rand::Rng;

use super::grouping::{claim_members, draw_members, group_free_particles};
use super::tracker::{JobKind, MergeTracker};
use crate::components::SizeClass;
use crate::taxonomy::Taxonomy;

/// Try to start one size-merge job. Returns the new job id.
///
/// Only particles within the conversion radius of their own tier's
/// generator are eligible; tiers without a generator are skipped. One full
/// group is drawn at random from a randomly chosen candidate group.
pub fn select_size_merge<R: Rng + ?Sized>(
    world: &mut World,
    taxonomy: &Taxonomy,
    tracker: &mut MergeTracker,
    rng: &mut R,
    now: f64,
) -> Option<u64> {
    if !tracker.is_idle() {
        return None;
    }

    let threshold = taxonomy.tuning.group_threshold as usize;
    let mut groups = group_free_particles(world, |particle, pos| {
        particle.size < SizeClass::MAX
            && taxonomy
                .generator(particle.tier)
                .is_some_and(|anchor| taxonomy.within_radius(pos, &anchor))
    });

    let candidates: Vec<_> = groups
        .iter()
        .filter(|(_, members)| members.len() >= threshold)
        .map(|(key, _)| *key)
        .collect();

    let &(tier, size) = candidates.choose(rng)?;
    let anchor = taxonomy.generator(tier)?;
    let next = size.next()?;
    let group = groups.get_mut(&(tier, size))?;

    let drawn = draw_members(group, threshold, rng);
    claim_members(world, &drawn, anchor);
    let entities = drawn.iter().map(|m| m.entity).collect();
    Some(tracker.start_job(entities, anchor, tier, next, JobKind::SizeMerge, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Particle, Position, Tier, Vec2, Velocity};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spawn_n(world: &mut World, tier: u8, size: SizeClass, pos: Vec2, n: usize) {
        for _ in 0..n {
            world.spawn((Particle::new(Tier(tier), size), Position(pos), Velocity::default()));
        }
    }

    fn merging_count(world: &World) -> usize {
        world
            .query::<&Particle>()
            .iter()
            .filter(|(_, p)| p.merging)
            .count()
    }

    #[test]
    fn test_starts_job_for_full_group() {
        let mut world = World::new();
        let taxonomy = Taxonomy::default();
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(1);
        let anchor = taxonomy.generator(Tier(0)).unwrap();
        spawn_n(&mut world, 0, SizeClass::Small, anchor, 130);

        let id = select_size_merge(&mut world, &taxonomy, &mut tracker, &mut rng, 2.0);
        assert!(id.is_some());
        let job = &tracker.jobs()[0];
        assert_eq!(job.particles.len(), 100);
        assert_eq!(job.result_tier, Tier(0));
        assert_eq!(job.result_size, SizeClass::Medium);
        assert_eq!(job.target, anchor);
        assert_eq!(job.started_at, 2.0);
        assert_eq!(merging_count(&world), 100);

        for &e in &job.particles {
            let p = world.get::<&Particle>(e).unwrap();
            assert_eq!(p.merge_target, Some(anchor));
        }
    }

    #[test]
    fn test_respects_single_flight_gate() {
        let mut world = World::new();
        let taxonomy = Taxonomy::default();
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(1);
        let anchor = taxonomy.generator(Tier(0)).unwrap();
        spawn_n(&mut world, 0, SizeClass::Small, anchor, 250);

        assert!(select_size_merge(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0).is_some());
        assert!(select_size_merge(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0).is_none());
        assert_eq!(tracker.active_count(), 1);
        assert_eq!(merging_count(&world), 100);
    }

    #[test]
    fn test_ignores_particles_outside_radius() {
        let mut world = World::new();
        let taxonomy = Taxonomy::default();
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(1);
        let anchor = taxonomy.generator(Tier(0)).unwrap();
        spawn_n(&mut world, 0, SizeClass::Small, anchor, 60);
        spawn_n(&mut world, 0, SizeClass::Small, anchor + Vec2::new(500.0, 0.0), 60);
        // Tier 1 particles sitting at tier 0's anchor do not count for tier 1
        spawn_n(&mut world, 1, SizeClass::Small, anchor, 150);

        assert!(select_size_merge(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0).is_none());
        assert!(tracker.is_idle());
    }

    #[test]
    fn test_max_size_never_size_merges() {
        let mut world = World::new();
        let taxonomy = Taxonomy::default();
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(1);
        let anchor = taxonomy.generator(Tier(0)).unwrap();
        spawn_n(&mut world, 0, SizeClass::ExtraLarge, anchor, 120);

        assert!(select_size_merge(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0).is_none());
    }

    #[test]
    fn test_tier_without_generator_is_skipped() {
        let mut world = World::new();
        let mut taxonomy = Taxonomy::default();
        let anchor = taxonomy.generator(Tier(1)).unwrap();
        taxonomy.tiers[1].generator = None;
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(1);
        spawn_n(&mut world, 1, SizeClass::Small, anchor, 120);

        assert!(select_size_merge(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0).is_none());
    }

    #[test]
    fn test_picks_among_candidate_groups() {
        let taxonomy = Taxonomy::default();
        let mut seen = std::collections::BTreeSet::new();
        for seed in 0..32 {
            let mut world = World::new();
            let mut tracker = MergeTracker::new();
            let mut rng = StdRng::seed_from_u64(seed);
            spawn_n(&mut world, 0, SizeClass::Small, taxonomy.generator(Tier(0)).unwrap(), 100);
            spawn_n(&mut world, 2, SizeClass::Large, taxonomy.generator(Tier(2)).unwrap(), 100);
            select_size_merge(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0).unwrap();
            seen.insert(tracker.jobs()[0].result_tier);
        }
        assert_eq!(seen.len(), 2);
    }
}

//! Bulk compression selector - folds a full group of ExtraLarge particles
//! anywhere on the playfield into a few ExtraLarge particles of the next tier

use hecs::World;
use rand::seq::SliceRandom;
use rand::Rng;

use super::grouping::{claim_members, draw_members, group_free_particles};
use super::tracker::{JobKind, MergeTracker};
use crate::components::{SizeClass, Vec2};
use crate::taxonomy::Taxonomy;

/// Try to start one bulk compression. Returns the new job id.
///
/// Not anchor-restricted: the drawn particles gather at their own centroid.
pub fn select_bulk_compression<R: Rng + ?Sized>(
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
    let mut groups = group_free_particles(world, |particle, _| {
        particle.size == SizeClass::MAX && taxonomy.next_tier(particle.tier).is_some()
    });

    let candidates: Vec<_> = groups
        .iter()
        .filter(|(_, members)| members.len() >= threshold)
        .map(|(key, _)| *key)
        .collect();

    let &(tier, size) = candidates.choose(rng)?;
    let next = taxonomy.next_tier(tier)?;
    let group = groups.get_mut(&(tier, size))?;

    let drawn = draw_members(group, threshold, rng);
    let target = Vec2::centroid(drawn.iter().map(|m| m.position))?;
    claim_members(world, &drawn, target);
    let entities = drawn.iter().map(|m| m.entity).collect();
    Some(tracker.start_job(
        entities,
        target,
        next,
        SizeClass::MAX,
        JobKind::TierConversion {
            count: taxonomy.tuning.bulk_conversion_count,
        },
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Particle, Position, Tier, Velocity};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spawn_n(world: &mut World, tier: u8, size: SizeClass, pos: Vec2, n: usize) {
        for _ in 0..n {
            world.spawn((Particle::new(Tier(tier), size), Position(pos), Velocity::default()));
        }
    }

    #[test]
    fn test_compresses_anywhere_to_centroid() {
        let mut world = World::new();
        let taxonomy = Taxonomy::default();
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(4);
        // Far from every anchor, split between two spots
        spawn_n(&mut world, 1, SizeClass::ExtraLarge, Vec2::new(1000.0, 1000.0), 50);
        spawn_n(&mut world, 1, SizeClass::ExtraLarge, Vec2::new(1200.0, 1000.0), 50);

        select_bulk_compression(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0).unwrap();
        let job = &tracker.jobs()[0];
        assert_eq!(job.particles.len(), 100);
        assert_eq!(job.result_tier, Tier(2));
        assert_eq!(job.result_size, SizeClass::ExtraLarge);
        assert_eq!(job.kind, JobKind::TierConversion { count: 10 });
        assert!((job.target.x - 1100.0).abs() < 1e-2);
        assert!((job.target.y - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_last_tier_is_never_compressed() {
        let mut world = World::new();
        let taxonomy = Taxonomy::default();
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(4);
        spawn_n(&mut world, 4, SizeClass::ExtraLarge, Vec2::ZERO, 150);

        let started = select_bulk_compression(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0);
        assert!(started.is_none());
    }

    #[test]
    fn test_needs_full_group_of_max_size() {
        let mut world = World::new();
        let taxonomy = Taxonomy::default();
        let mut tracker = MergeTracker::new();
        let mut rng = StdRng::seed_from_u64(4);
        spawn_n(&mut world, 0, SizeClass::ExtraLarge, Vec2::ZERO, 99);
        spawn_n(&mut world, 0, SizeClass::Large, Vec2::ZERO, 300);

        let started = select_bulk_compression(&mut world, &taxonomy, &mut tracker, &mut rng, 0.0);
        assert!(started.is_none());
    }
}

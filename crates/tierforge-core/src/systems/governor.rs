//! Performance governor - instant, un-animated merges when the population
//! crosses the performance threshold.
//!
//! Bypasses jobs entirely: no timeout, no shockwave, no unlock. Only Small
//! particles near their generator are folded, one full group at a time,
//! until the group runs short or the population drops under the threshold.

use hecs::{Entity, World};
use log::info;

use super::grouping::group_free_particles;
use super::tracker::spawn_particle;
use crate::components::{SizeClass, Tier, Vec2};
use crate::taxonomy::Taxonomy;

/// Outcome of one governor pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GovernorReport {
    /// Medium particles created
    pub conversions: usize,
    /// Small particles removed
    pub consumed: usize,
}

/// Whether the governor should take over this tick
pub fn governor_triggered(world: &World, taxonomy: &Taxonomy) -> bool {
    world.len() as usize >= taxonomy.tuning.performance_threshold
}

/// Run one governor pass. Does nothing below the performance threshold.
pub fn run_governor(world: &mut World, taxonomy: &Taxonomy) -> GovernorReport {
    let mut report = GovernorReport::default();
    if !governor_triggered(world, taxonomy) {
        return report;
    }

    let threshold = taxonomy.tuning.group_threshold as usize;
    // A group of one or none cannot shrink the population
    if threshold < 2 {
        return report;
    }
    let ceiling = taxonomy.tuning.performance_threshold;
    let mut projected = world.len() as usize;

    let groups = group_free_particles(world, |particle, pos| {
        particle.size == SizeClass::Small
            && taxonomy
                .generator(particle.tier)
                .is_some_and(|anchor| taxonomy.within_radius(pos, &anchor))
    });

    let mut consumed: Vec<Entity> = Vec::new();
    let mut created: Vec<(Tier, Vec2)> = Vec::new();

    'tiers: for ((tier, _), members) in &groups {
        let Some(anchor) = taxonomy.generator(*tier) else {
            continue;
        };
        for chunk in members.chunks_exact(threshold) {
            if projected < ceiling {
                break 'tiers;
            }
            consumed.extend(chunk.iter().map(|m| m.entity));
            created.push((*tier, anchor));
            projected = projected - threshold + 1;
        }
    }

    for &entity in &consumed {
        if world.despawn(entity).is_ok() {
            report.consumed += 1;
        }
    }
    for (tier, anchor) in created {
        spawn_particle(world, tier, SizeClass::Medium, anchor, Vec2::ZERO);
        report.conversions += 1;
    }

    if report.conversions > 0 {
        info!(
            "governor folded {} smalls into {} mediums, population now {}",
            report.consumed,
            report.conversions,
            world.len()
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Particle, Position, Velocity};

    fn taxonomy(threshold: usize) -> Taxonomy {
        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.performance_threshold = threshold;
        taxonomy.tuning.population_cap = threshold * 4;
        taxonomy
    }

    fn spawn_n(world: &mut World, tier: u8, size: SizeClass, pos: Vec2, n: usize) {
        for _ in 0..n {
            world.spawn((Particle::new(Tier(tier), size), Position(pos), Velocity::default()));
        }
    }

    fn count(world: &World, tier: u8, size: SizeClass) -> usize {
        world
            .query::<&Particle>()
            .iter()
            .filter(|(_, p)| p.tier == Tier(tier) && p.size == size)
            .count()
    }

    #[test]
    fn test_below_threshold_does_nothing() {
        let mut world = World::new();
        let taxonomy = taxonomy(1_000);
        spawn_n(&mut world, 0, SizeClass::Small, taxonomy.generator(Tier(0)).unwrap(), 300);

        assert_eq!(run_governor(&mut world, &taxonomy), GovernorReport::default());
        assert_eq!(world.len(), 300);
    }

    #[test]
    fn test_stops_once_under_threshold() {
        let mut world = World::new();
        let taxonomy = taxonomy(250);
        spawn_n(&mut world, 0, SizeClass::Small, taxonomy.generator(Tier(0)).unwrap(), 500);

        let report = run_governor(&mut world, &taxonomy);
        // 500 -> 401 -> 302 -> 203
        assert_eq!(report.conversions, 3);
        assert_eq!(report.consumed, 300);
        assert_eq!(world.len(), 203);
        assert_eq!(count(&world, 0, SizeClass::Medium), 3);
    }

    #[test]
    fn test_leaves_partial_groups_and_merging_particles() {
        let mut world = World::new();
        let taxonomy = taxonomy(100);
        let anchor = taxonomy.generator(Tier(1)).unwrap();
        spawn_n(&mut world, 1, SizeClass::Small, anchor, 150);
        let mut claimed = Particle::new(Tier(1), SizeClass::Small);
        claimed.claim(anchor);
        for _ in 0..60 {
            world.spawn((claimed, Position(anchor), Velocity::default()));
        }

        let report = run_governor(&mut world, &taxonomy);
        assert_eq!(report.conversions, 1);
        assert_eq!(count(&world, 1, SizeClass::Small), 110);
        let still_merging = world
            .query::<&Particle>()
            .iter()
            .filter(|(_, p)| p.merging)
            .count();
        assert_eq!(still_merging, 60);
    }

    #[test]
    fn test_only_small_near_anchor_are_folded() {
        let mut world = World::new();
        let taxonomy = taxonomy(100);
        let anchor = taxonomy.generator(Tier(0)).unwrap();
        spawn_n(&mut world, 0, SizeClass::Medium, anchor, 200);
        spawn_n(&mut world, 0, SizeClass::Small, anchor + Vec2::new(300.0, 0.0), 200);

        let report = run_governor(&mut world, &taxonomy);
        assert_eq!(report.conversions, 0);
        assert_eq!(world.len(), 400);
    }

    #[test]
    fn test_degenerate_group_threshold_is_a_no_op() {
        for group_threshold in [0, 1] {
            let mut world = World::new();
            let mut taxonomy = taxonomy(100);
            taxonomy.tuning.group_threshold = group_threshold;
            spawn_n(&mut world, 0, SizeClass::Small, taxonomy.generator(Tier(0)).unwrap(), 150);

            assert_eq!(run_governor(&mut world, &taxonomy), GovernorReport::default());
            assert_eq!(world.len(), 150);
        }
    }
}

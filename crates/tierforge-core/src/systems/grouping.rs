//! Grouping and sampling helpers shared by the selectors and the governor

use std::collections::BTreeMap;

use hecs::{Entity, World};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::{Particle, Position, SizeClass, Tier, Vec2};

/// A free particle as seen by a grouping pass
#[derive(Debug, Clone, Copy)]
pub struct Member {
    pub entity: Entity,
    pub position: Vec2,
}

/// Free particles keyed by (tier, size). BTreeMap keeps candidate order
/// stable so seeded runs replay identically.
pub type ParticleGroups = BTreeMap<(Tier, SizeClass), Vec<Member>>;

/// Group every non-merging particle accepted by `filter`.
///
/// Merging particles are never handed to `filter`; this is what keeps a
/// particle from being claimed by two jobs.
pub fn group_free_particles<F>(world: &World, mut filter: F) -> ParticleGroups
where
    F: FnMut(&Particle, &Vec2) -> bool,
{
    let mut groups = ParticleGroups::new();
    for (entity, (particle, pos)) in world.query::<(&Particle, &Position)>().iter() {
        if particle.merging || !filter(particle, &pos.0) {
            continue;
        }
        groups
            .entry((particle.tier, particle.size))
            .or_default()
            .push(Member {
                entity,
                position: pos.0,
            });
    }
    groups
}

/// Draw `count` members uniformly without replacement.
///
/// Partial Fisher-Yates over the group, O(count). Returns fewer than
/// `count` only when the group is smaller.
pub fn draw_members<R: Rng + ?Sized>(
    group: &mut [Member],
    count: usize,
    rng: &mut R,
) -> Vec<Member> {
    let amount = count.min(group.len());
    let (chosen, _) = group.partial_shuffle(rng, amount);
    chosen.to_vec()
}

/// Mark particles as owned by a job heading for `target`
pub fn claim_members(world: &mut World, members: &[Member], target: Vec2) {
    for member in members {
        if let Ok(mut particle) = world.get::<&mut Particle>(member.entity) {
            particle.claim(target);
        }
    }
}

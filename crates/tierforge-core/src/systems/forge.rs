//! Forge promotion selector - during a crunch, lifts one ExtraLarge particle
//! sitting at the forge two tiers up

use hecs::World;
use rand::seq::SliceRandom;
use rand::Rng;

use super::grouping::{claim_members, group_free_particles};
use super::tracker::{JobKind, MergeTracker};
use crate::components::{SizeClass, Tier};
use crate::taxonomy::Taxonomy;

/// Tiers a forge promotion jumps
const PROMOTION_STEP: u8 = 2;

/// Try to start one forge promotion. Returns the new job id.
///
/// Callers gate this on the crunch trigger. Tiers are scanned lowest first
/// and the first one with an eligible particle wins. Promotions always yield
/// Medium particles, never a swarm of Smalls.
pub fn select_forge_promotion<R: Rng + ?Sized>(
    world: &mut World,
    taxonomy: &Taxonomy,
    tracker: &mut MergeTracker,
    rng: &mut R,
    now: f64,
) -> Option<u64> {
    if !tracker.is_idle() {
        return None;
    }
    let forge = taxonomy.forge?;
    let tier_count = taxonomy.tier_count();

    let groups = group_free_particles(world, |particle, pos| {
        particle.size == SizeClass::MAX
            && particle.tier.up(PROMOTION_STEP, tier_count).is_some()
            && taxonomy.within_radius(pos, &forge)
    });

    for source in taxonomy.tier_ids() {
        let Some(target_tier) = promotion_target(taxonomy, source) else {
            break;
        };
        let Some(members) = groups.get(&(source, SizeClass::MAX)) else {
            continue;
        };
        let Some(chosen) = members.choose(rng).copied() else {
            continue;
        };

        claim_members(world, &[chosen], forge);
        return Some(tracker.start_job(
            vec![chosen.entity],
            forge,
            target_tier,
            SizeClass::Medium,
            JobKind::TierConversion {
                count: taxonomy.tuning.forge_conversion_count,
            },
            now,
        ));
    }

    None
}

/// Tier a forge promotion from `source` lands in, if any
pub fn promotion_target(taxonomy: &Taxonomy, source: Tier) -> Option<Tier> {
    source.up(PROMOTION_STEP, taxonomy.tier_count())
}

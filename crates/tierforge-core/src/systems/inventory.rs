//! Inventory aggregation - normalized base-unit counts per tier

use hecs::World;
use serde::{Deserialize, Serialize};

use crate::components::{Particle, Tier};
use crate::taxonomy::Taxonomy;

/// Base-size units held per tier. Derived from the population, never
/// authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    counts: Vec<u64>,
}

impl Inventory {
    pub fn new(tier_count: usize) -> Self {
        Self {
            counts: vec![0; tier_count],
        }
    }

    pub fn get(&self, tier: Tier) -> u64 {
        self.counts.get(tier.index()).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &units)| (Tier(i as u8), units))
    }

    pub fn tier_count(&self) -> usize {
        self.counts.len()
    }
}

/// Recompute the inventory from scratch.
///
/// A particle of size index `s` contributes `group_threshold^s` units to its
/// tier. O(n) over the population; call once per batch of changes.
pub fn recompute_inventory(world: &World, taxonomy: &Taxonomy) -> Inventory {
    let threshold = taxonomy.tuning.group_threshold;
    let mut inventory = Inventory::new(taxonomy.tier_count());

    for (_, particle) in world.query::<&Particle>().iter() {
        if let Some(slot) = inventory.counts.get_mut(particle.tier.index()) {
            *slot = slot.saturating_add(particle.size.weight(threshold));
        }
    }

    inventory
}

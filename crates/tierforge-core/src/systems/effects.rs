//! Side records for collaborators: tier unlocks, fade-in timers and the
//! shockwave queue read by the rendering layer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::components::{Color, Tier, Vec2};

/// Tiers the player has seen. Monotonic - tiers are never re-locked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnlockRegistry {
    unlocked: BTreeSet<Tier>,
    /// Sim time at which each tier started fading in
    fade_ins: BTreeMap<Tier, f64>,
}

impl UnlockRegistry {
    /// Registry with `tiers` unlocked from the start, no fade-in
    pub fn with_unlocked(tiers: impl IntoIterator<Item = Tier>) -> Self {
        Self {
            unlocked: tiers.into_iter().collect(),
            fade_ins: BTreeMap::new(),
        }
    }

    /// Unlock `tier` and start its fade-in. Returns false if already unlocked.
    pub fn unlock(&mut self, tier: Tier, now: f64) -> bool {
        if !self.unlocked.insert(tier) {
            return false;
        }
        self.fade_ins.insert(tier, now);
        true
    }

    pub fn is_unlocked(&self, tier: Tier) -> bool {
        self.unlocked.contains(&tier)
    }

    pub fn unlocked(&self) -> impl Iterator<Item = Tier> + '_ {
        self.unlocked.iter().copied()
    }

    pub fn fade_in_started(&self, tier: Tier) -> Option<f64> {
        self.fade_ins.get(&tier).copied()
    }

    /// Opacity for a tier's UI: 0 while locked, ramps to 1 over `duration`
    pub fn fade_in_alpha(&self, tier: Tier, now: f64, duration: f64) -> f32 {
        if !self.is_unlocked(tier) {
            return 0.0;
        }
        match self.fade_in_started(tier) {
            Some(start) if duration > 0.0 => ((now - start) / duration).clamp(0.0, 1.0) as f32,
            _ => 1.0,
        }
    }
}

/// Visual shockwave notification for a completed size merge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shockwave {
    pub position: Vec2,
    pub started_at: f64,
    pub color: Color,
    pub tier: Tier,
}

/// Shockwaves waiting for the renderer. Drained, not peeked.
#[derive(Debug, Clone, Default)]
pub struct ShockwaveQueue {
    pending: Vec<Shockwave>,
}

impl ShockwaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, shockwave: Shockwave) {
        self.pending.push(shockwave);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Shockwave> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlock_is_monotonic() {
        let mut registry = UnlockRegistry::with_unlocked([Tier(0)]);
        assert!(registry.is_unlocked(Tier(0)));
        assert!(!registry.unlock(Tier(0), 5.0));
        assert!(registry.fade_in_started(Tier(0)).is_none());

        assert!(registry.unlock(Tier(2), 10.0));
        assert!(!registry.unlock(Tier(2), 20.0));
        assert_eq!(registry.fade_in_started(Tier(2)), Some(10.0));
        assert_eq!(registry.unlocked().collect::<Vec<_>>(), vec![Tier(0), Tier(2)]);
    }

    #[test]
    fn test_fade_in_alpha() {
        let mut registry = UnlockRegistry::with_unlocked([Tier(0)]);
        assert_eq!(registry.fade_in_alpha(Tier(0), 0.0, 2.0), 1.0);
        assert_eq!(registry.fade_in_alpha(Tier(1), 0.0, 2.0), 0.0);

        registry.unlock(Tier(1), 4.0);
        assert_eq!(registry.fade_in_alpha(Tier(1), 4.0, 2.0), 0.0);
        assert!((registry.fade_in_alpha(Tier(1), 5.0, 2.0) - 0.5).abs() < 1e-6);
        assert_eq!(registry.fade_in_alpha(Tier(1), 9.0, 2.0), 1.0);
    }

    #[test]
    fn test_shockwave_drain() {
        let mut queue = ShockwaveQueue::new();
        queue.push(Shockwave {
            position: Vec2::new(1.0, 1.0),
            started_at: 0.5,
            color: Color::rgb(1, 2, 3),
            tier: Tier(0),
        });
        assert_eq!(queue.len(), 1);
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
    }
}

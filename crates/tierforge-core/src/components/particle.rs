//! Particle components - the discrete resource units the tower accumulates.

use serde::{Deserialize, Serialize};

use super::Vec2;

/// Resource category. Wraps the index into the taxonomy's ordered tier list,
/// so ordering follows progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tier(pub u8);

impl Tier {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The tier `steps` above this one, if it stays inside `tier_count`
    pub fn up(self, steps: u8, tier_count: usize) -> Option<Tier> {
        let next = self.0.checked_add(steps)?;
        if (next as usize) < tier_count {
            Some(Tier(next))
        } else {
            None
        }
    }
}

/// Magnitude level within a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl SizeClass {
    pub const ALL: [SizeClass; 4] = [
        SizeClass::Small,
        SizeClass::Medium,
        SizeClass::Large,
        SizeClass::ExtraLarge,
    ];

    /// Largest size class; particles of this size never size-merge
    pub const MAX: SizeClass = SizeClass::ExtraLarge;

    pub fn index(self) -> u32 {
        match self {
            SizeClass::Small => 0,
            SizeClass::Medium => 1,
            SizeClass::Large => 2,
            SizeClass::ExtraLarge => 3,
        }
    }

    pub fn next(self) -> Option<SizeClass> {
        match self {
            SizeClass::Small => Some(SizeClass::Medium),
            SizeClass::Medium => Some(SizeClass::Large),
            SizeClass::Large => Some(SizeClass::ExtraLarge),
            SizeClass::ExtraLarge => None,
        }
    }

    /// Base-size units one particle of this class stands for
    pub fn weight(self, group_threshold: u32) -> u64 {
        (group_threshold as u64).saturating_pow(self.index())
    }
}

/// Particle component. `merging` is set while a merge job owns the particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub tier: Tier,
    pub size: SizeClass,
    pub merging: bool,
    pub merge_target: Option<Vec2>,
}

impl Particle {
    pub fn new(tier: Tier, size: SizeClass) -> Self {
        Self {
            tier,
            size,
            merging: false,
            merge_target: None,
        }
    }

    /// Hand the particle to a job heading for `target`
    pub fn claim(&mut self, target: Vec2) {
        self.merging = true;
        self.merge_target = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_class_ordering() {
        assert!(SizeClass::Small < SizeClass::Medium);
        assert!(SizeClass::Large < SizeClass::ExtraLarge);
        assert_eq!(SizeClass::MAX.next(), None);
        for pair in SizeClass::ALL.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
    }

    #[test]
    fn test_size_class_weight() {
        assert_eq!(SizeClass::Small.weight(100), 1);
        assert_eq!(SizeClass::Medium.weight(100), 100);
        assert_eq!(SizeClass::Large.weight(100), 10_000);
        assert_eq!(SizeClass::ExtraLarge.weight(100), 1_000_000);
    }

    #[test]
    fn test_tier_up() {
        assert_eq!(Tier(0).up(2, 5), Some(Tier(2)));
        assert_eq!(Tier(3).up(2, 5), None);
        assert_eq!(Tier(3).up(1, 5), Some(Tier(4)));
    }

    #[test]
    fn test_claim() {
        let mut p = Particle::new(Tier(0), SizeClass::Small);
        assert!(!p.merging);
        p.claim(Vec2::new(1.0, 2.0));
        assert!(p.merging);
        assert_eq!(p.merge_target, Some(Vec2::new(1.0, 2.0)));
    }
}

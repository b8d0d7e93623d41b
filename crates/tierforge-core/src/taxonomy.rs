//! Tier/size taxonomy and merge tuning.
//!
//! The taxonomy is static configuration: the ordered tier list with each
//! tier's generator anchor and color, the shared forge anchor, and the
//! numeric thresholds that drive selection, completion and the governor.
//! It is usually loaded once from JSON at startup.

use serde::{Deserialize, Serialize};

use crate::components::{Color, Tier, Vec2};
use crate::error::TaxonomyError;

/// One resource tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    /// Color used for shockwaves and particles of this tier
    pub color: Color,
    /// Where this tier's particles are generated and size-merged.
    /// Tiers without an anchor never size-merge.
    #[serde(default)]
    pub generator: Option<Vec2>,
}

impl TierSpec {
    pub fn new(name: impl Into<String>, color: Color, generator: Option<Vec2>) -> Self {
        Self {
            name: name.into(),
            color,
            generator,
        }
    }
}

/// Numeric knobs for the merge engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeTuning {
    /// Particles of one size class that merge into one of the next class
    pub group_threshold: u32,
    /// Population at which the governor takes over
    pub performance_threshold: usize,
    /// Hard ceiling; nothing is created past it
    pub population_cap: usize,
    /// Max distance from an anchor for a particle to be eligible
    pub conversion_radius: f32,
    /// Distance under which a job particle counts as gathered
    pub gather_distance: f32,
    /// Seconds before a job completes regardless of gathering
    pub job_timeout: f64,
    /// Particles yielded by a forge promotion
    pub forge_conversion_count: u32,
    /// Particles yielded by a bulk compression
    pub bulk_conversion_count: u32,
    /// Conversion count that collapses to a single Medium particle under
    /// performance pressure. Compared by exact equality.
    pub collapse_conversion_count: u32,
    /// Outward burst speed range for tier-conversion results (units/s)
    pub burst_speed: (f32, f32),
    /// Speed at which merging particles are steered toward their target
    pub steering_speed: f32,
    /// Fraction of velocity kept per second by free particles
    pub velocity_retention: f32,
    /// Seconds a newly unlocked tier takes to fade in
    pub fade_in_duration: f64,
    /// Random offset applied by `spawn_at_generator`
    pub spawn_jitter: f32,
}

impl Default for MergeTuning {
    fn default() -> Self {
        Self {
            group_threshold: 100,
            performance_threshold: 2_000,
            population_cap: 4_000,
            conversion_radius: 60.0,
            gather_distance: 6.0,
            job_timeout: 3.0,
            forge_conversion_count: 1,
            bulk_conversion_count: 10,
            collapse_conversion_count: 100,
            burst_speed: (20.0, 60.0),
            steering_speed: 150.0,
            velocity_retention: 0.1,
            fade_in_duration: 1.5,
            spawn_jitter: 12.0,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    /// Tiers in progression order
    pub tiers: Vec<TierSpec>,
    /// Shared anchor where two-tier promotions happen
    #[serde(default)]
    pub forge: Option<Vec2>,
    #[serde(default)]
    pub tuning: MergeTuning,
}

impl Taxonomy {
    pub fn new(tiers: Vec<TierSpec>, forge: Option<Vec2>, tuning: MergeTuning) -> Self {
        Self {
            tiers,
            forge,
            tuning,
        }
    }

    /// Parse and validate a taxonomy from JSON
    pub fn from_json_str(json: &str) -> Result<Self, TaxonomyError> {
        let taxonomy: Taxonomy = serde_json::from_str(json)?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check structural constraints the engine relies on
    pub fn validate(&self) -> Result<(), TaxonomyError> {
        if self.tiers.is_empty() {
            return Err(TaxonomyError::NoTiers);
        }
        if self.tiers.len() > u8::MAX as usize {
            return Err(TaxonomyError::TooManyTiers(self.tiers.len()));
        }
        for (i, tier) in self.tiers.iter().enumerate() {
            if self.tiers[..i].iter().any(|t| t.name == tier.name) {
                return Err(TaxonomyError::DuplicateTierName(tier.name.clone()));
            }
        }

        let t = &self.tuning;
        if t.group_threshold < 2 {
            return Err(TaxonomyError::GroupThresholdTooSmall(t.group_threshold));
        }
        for (name, value) in [
            ("conversion_radius", t.conversion_radius),
            ("gather_distance", t.gather_distance),
            ("job_timeout", t.job_timeout as f32),
            ("steering_speed", t.steering_speed),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(TaxonomyError::NonPositive { name, value });
            }
        }
        for (name, value) in [
            ("spawn_jitter", t.spawn_jitter),
            ("fade_in_duration", t.fade_in_duration as f32),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(TaxonomyError::Negative { name, value });
            }
        }
        if !(0.0..=1.0).contains(&t.velocity_retention) {
            return Err(TaxonomyError::RetentionOutOfRange(t.velocity_retention));
        }
        let (min, max) = t.burst_speed;
        if !(min.is_finite() && max.is_finite() && 0.0 <= min && min <= max) {
            return Err(TaxonomyError::InvalidBurstSpeed { min, max });
        }
        if t.population_cap < t.performance_threshold {
            return Err(TaxonomyError::CapBelowThreshold {
                cap: t.population_cap,
                threshold: t.performance_threshold,
            });
        }
        Ok(())
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// All tiers in progression order
    pub fn tier_ids(&self) -> impl Iterator<Item = Tier> {
        (0..self.tiers.len()).map(|i| Tier(i as u8))
    }

    pub fn tier(&self, tier: Tier) -> Option<&TierSpec> {
        self.tiers.get(tier.index())
    }

    pub fn tier_by_name(&self, name: &str) -> Option<Tier> {
        self.tiers
            .iter()
            .position(|t| t.name == name)
            .map(|i| Tier(i as u8))
    }

    pub fn generator(&self, tier: Tier) -> Option<Vec2> {
        self.tier(tier).and_then(|t| t.generator)
    }

    pub fn color(&self, tier: Tier) -> Color {
        self.tier(tier).map(|t| t.color).unwrap_or_default()
    }

    pub fn next_tier(&self, tier: Tier) -> Option<Tier> {
        tier.up(1, self.tier_count())
    }

    /// Whether `pos` lies within the conversion radius of `anchor`
    pub fn within_radius(&self, pos: &Vec2, anchor: &Vec2) -> bool {
        let r = self.tuning.conversion_radius;
        pos.distance_squared(anchor) <= r * r
    }
}

impl Default for Taxonomy {
    /// The standard five-tier tower: generators in a row, forge below
    fn default() -> Self {
        let tiers = vec![
            TierSpec::new("sand", Color::rgb(0xe8, 0xd4, 0x9a), Some(Vec2::new(100.0, 100.0))),
            TierSpec::new("quartz", Color::rgb(0xf2, 0xf2, 0xf2), Some(Vec2::new(250.0, 100.0))),
            TierSpec::new("ruby", Color::rgb(0xd0, 0x21, 0x3c), Some(Vec2::new(400.0, 100.0))),
            TierSpec::new("sunstone", Color::rgb(0xff, 0x9f, 0x1c), Some(Vec2::new(550.0, 100.0))),
            TierSpec::new("nullstone", Color::rgb(0x3a, 0x2e, 0x6e), Some(Vec2::new(700.0, 100.0))),
        ];
        Self {
            tiers,
            forge: Some(Vec2::new(400.0, 320.0)),
            tuning: MergeTuning::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Taxonomy::default().validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_keeps_tiers() {
        let taxonomy = Taxonomy::default();
        let json = taxonomy.to_json_pretty().unwrap();
        let parsed = Taxonomy::from_json_str(&json).unwrap();
        assert_eq!(parsed.tier_count(), 5);
        assert_eq!(parsed.tier_by_name("ruby"), Some(Tier(2)));
        assert_eq!(parsed.forge, taxonomy.forge);
    }

    #[test]
    fn test_tuning_defaults_fill_missing_fields() {
        let json = r#"{
            "tiers": [{ "name": "a", "color": { "r": 1, "g": 2, "b": 3 } }],
            "tuning": { "group_threshold": 10 }
        }"#;
        let taxonomy = Taxonomy::from_json_str(json).unwrap();
        assert_eq!(taxonomy.tuning.group_threshold, 10);
        assert_eq!(taxonomy.tuning.bulk_conversion_count, 10);
        assert_eq!(taxonomy.tuning.collapse_conversion_count, 100);
        assert!(taxonomy.forge.is_none());
        assert!(taxonomy.generator(Tier(0)).is_none());
    }

    #[test]
    fn test_validation_errors() {
        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.group_threshold = 1;
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::GroupThresholdTooSmall(1))
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.population_cap = 10;
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::CapBelowThreshold { .. })
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.gather_distance = 0.0;
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::NonPositive { name: "gather_distance", .. })
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tiers[1].name = "sand".to_string();
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::DuplicateTierName(_))
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.spawn_jitter = f32::INFINITY;
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::Negative { name: "spawn_jitter", .. })
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.fade_in_duration = -1.0;
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::Negative { name: "fade_in_duration", .. })
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.velocity_retention = 1.5;
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::RetentionOutOfRange(_))
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.burst_speed = (60.0, 20.0);
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::InvalidBurstSpeed { .. })
        ));
        taxonomy.tuning.burst_speed = (0.0, f32::INFINITY);
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::InvalidBurstSpeed { .. })
        ));

        let mut taxonomy = Taxonomy::default();
        taxonomy.tuning.spawn_jitter = 0.0;
        taxonomy.tuning.burst_speed = (0.0, 0.0);
        assert!(taxonomy.validate().is_ok());

        assert!(matches!(
            Taxonomy::new(Vec::new(), None, MergeTuning::default()).validate(),
            Err(TaxonomyError::NoTiers)
        ));
        assert!(matches!(
            Taxonomy::from_json_str("{ not json"),
            Err(TaxonomyError::Json(_))
        ));
    }

    #[test]
    fn test_next_tier_and_radius() {
        let taxonomy = Taxonomy::default();
        assert_eq!(taxonomy.next_tier(Tier(3)), Some(Tier(4)));
        assert_eq!(taxonomy.next_tier(Tier(4)), None);
        let anchor = Vec2::new(0.0, 0.0);
        assert!(taxonomy.within_radius(&Vec2::new(60.0, 0.0), &anchor));
        assert!(!taxonomy.within_radius(&Vec2::new(60.1, 0.0), &anchor));
    }
}

//! Tierforge Core - Tiered Particle Merge Engine
//!
//! Simulates a field of particles grouped by tier and size class. Full
//! groups gathered at their generator merge into one larger particle, big
//! particles at the forge jump two tiers, and a governor folds the
//! population down whenever it grows past the performance threshold.
//!
//! # Architecture
//!
//! The engine uses an Entity Component System (ECS) via `hecs`:
//! - **Entities**: particles, and nothing else
//! - **Components**: `Particle`, `Position`, `Velocity`
//! - **Systems**: selectors that start merge jobs, the tracker that
//!   completes them, the governor, inventory aggregation and steering
//!
//! At most one merge job is in flight at a time, and every completion is
//! followed by a one-tick cooldown.
//!
//! # Example
//!
//! ```rust,no_run
//! use tierforge_core::prelude::*;
//!
//! let mut engine = MergeEngine::new(Taxonomy::default());
//!
//! for _ in 0..250 {
//!     engine.spawn_at_generator(Tier(0), SizeClass::Small);
//! }
//!
//! loop {
//!     engine.advance_motion(1.0 / 60.0);
//!     let report = engine.tick(1.0 / 60.0);
//!     for shockwave in engine.drain_shockwaves() {
//!         println!("boom at {:?}", shockwave.position);
//!     }
//!     if report.completed.is_empty() {
//!         continue;
//!     }
//!     println!("sand units: {}", engine.inventory().get(Tier(0)));
//! }
//! ```

pub mod components;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod systems;
pub mod taxonomy;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{EngineToggles, MergeEngine, MergeStats, TickReport};
    pub use crate::error::{EngineError, TaxonomyError};
    pub use crate::snapshot::EngineSnapshot;
    pub use crate::systems::{CompletedJob, Inventory, JobKind, Shockwave};
    pub use crate::taxonomy::{MergeTuning, Taxonomy, TierSpec};
}

//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to particle entities.
//! They have no behavior - that lives in systems.

mod common;
mod particle;

pub use common::*;
pub use particle::*;

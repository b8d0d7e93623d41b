//! Systems - logic that operates on particle components

mod bulk;
mod effects;
mod forge;
mod governor;
mod grouping;
mod inventory;
mod merge;
mod movement;
mod tracker;

pub use bulk::*;
pub use effects::*;
pub use forge::*;
pub use governor::*;
pub use grouping::*;
pub use inventory::*;
pub use merge::*;
pub use movement::*;
pub use tracker::*;

//! Movement system - steers merging particles toward their job target and
//! lets free particles coast on their burst velocity

use hecs::World;

use crate::components::{Particle, Position, Vec2, Velocity};
use crate::taxonomy::MergeTuning;

/// Advance particle positions by `delta_seconds`
pub fn steering_system(world: &mut World, tuning: &MergeTuning, delta_seconds: f32) {
    if delta_seconds <= 0.0 {
        return;
    }
    let retention = tuning.velocity_retention.clamp(0.0, 1.0).powf(delta_seconds);

    let particles = world.query_mut::<(&Particle, &mut Position, &mut Velocity)>();
    for (_, (particle, pos, vel)) in particles {
        match (particle.merging, particle.merge_target) {
            (true, Some(target)) => {
                pos.0 = step_toward(pos.0, target, tuning.steering_speed * delta_seconds);
                vel.0 = Vec2::ZERO;
            }
            _ => {
                pos.0 = pos.0 + vel.0 * delta_seconds;
                vel.0 = vel.0 * retention;
            }
        }
    }
}

/// Move `from` toward `to` by at most `step`, landing exactly on arrival
fn step_toward(from: Vec2, to: Vec2, step: f32) -> Vec2 {
    let diff = to - from;
    let distance = diff.length();
    if distance < 0.1 || step >= distance {
        to
    } else {
        from + diff.normalize() * step
    }
}

// ECS systems for advancing the particle field
// Each system runs once per frame over every particle, in the order listed in ParticleField::step

use bevy_ecs::prelude::*;
use glam::Vec3;
use super::components::*;

/// Euler step: position += velocity.
/// Velocity is in units per frame, so there is no delta-time factor.
pub fn movement_system(world: &mut World) {
    let mut query = world.query::<(&mut Transform, &Velocity)>();
    for (mut transform, velocity) in query.iter_mut(world) {
        transform.position += velocity.linear;
    }
}

/// Cosmetic vertical drift: y += sin(elapsed + x) * amplitude.
/// Must run after movement_system so it sees this frame's x.
pub fn drift_system(world: &mut World, elapsed: f32, amplitude: f32) {
    let mut query = world.query::<&mut Transform>();
    for mut transform in query.iter_mut(world) {
        let x = transform.position.x;
        transform.position.y += (elapsed + x).sin() * amplitude;
    }
}

/// Soft containment: negate a velocity axis whose position magnitude exceeds the bound.
/// Positions are never clamped, the reversed velocity pulls them back on later frames.
pub fn reflection_system(world: &mut World, bounds: Vec3) {
    let mut query = world.query::<(&Transform, &mut Velocity)>();
    for (transform, mut velocity) in query.iter_mut(world) {
        let p = transform.position;
        if p.x.abs() > bounds.x {
            velocity.linear.x = -velocity.linear.x;
        }
        if p.y.abs() > bounds.y {
            velocity.linear.y = -velocity.linear.y;
        }
        if p.z.abs() > bounds.z {
            velocity.linear.z = -velocity.linear.z;
        }
    }
}

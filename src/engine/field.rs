// Particle field simulator ("synaptic web").
//
// Owns a fixed set of N particle entities in an ECS world. N never changes
// after construction: nothing spawns or despawns between new() and drop.
//
// Per frame (step):
//   1. movement_system  : position += velocity
//   2. drift_system     : y += sin(t + x) * drift_amplitude
//   3. reflection_system: flip velocity axes outside the soft bounds
//   4. connections      : O(N²) pair pass, rebuilds the line vertex list
//
// The group rotation and per-particle pulse are render-time only and never
// touch stored positions.

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::components::*;
use super::connections::{Connection, build_line_vertices, derive_connections};
use super::systems::{drift_system, movement_system, reflection_system};

// ============================================================================
// PARAMETERS
// ============================================================================

/// Tunables for the field. Defaults reproduce the hero scene exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldParams {
    pub count: usize,
    /// Full size of the spawn box; positions are sampled in ±extent/2.
    pub spawn_extent: Vec3,
    /// Full width of the per-axis velocity range; sampled in ±spread/2.
    pub velocity_spread: f32,
    /// Soft containment half-widths for reflection.
    pub bounds: Vec3,
    pub connection_distance: f32,
    pub drift_amplitude: f32,
    pub radius_min: f32,
    pub radius_max: f32,
    pub phase_max: f32,
    pub palette: Vec<Color>,
    pub pulse_frequency: f32,
    pub pulse_amplitude: f32,
    pub spin_speed: f32,
    pub wobble_frequency: f32,
    pub wobble_amplitude: f32,
}

/// Soft pastel palette: terracotta, peach, white, light pink, deep rose.
pub const DEFAULT_PALETTE: [&str; 5] = ["#F0A58E", "#F8C8B5", "#FFFFFF", "#F3BAD1", "#D9728E"];

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            count: 60,
            spawn_extent: Vec3::new(12.0, 7.0, 7.0),
            velocity_spread: 0.015,
            bounds: Vec3::new(7.0, 4.0, 5.0),
            connection_distance: 4.0,
            drift_amplitude: 0.002,
            radius_min: 0.1,
            radius_max: 0.22,
            phase_max: 10.0,
            palette: DEFAULT_PALETTE
                .iter()
                .filter_map(|hex| Color::from_hex(hex))
                .collect(),
            pulse_frequency: 3.0,
            pulse_amplitude: 0.1,
            spin_speed: 0.03,
            wobble_frequency: 0.1,
            wobble_amplitude: 0.03,
        }
    }
}

impl FieldParams {
    /// Render scale of one particle: 1 + sin(t * freq + phase) * amplitude.
    pub fn pulse_scale(&self, elapsed: f32, phase_offset: f32) -> f32 {
        1.0 + (elapsed * self.pulse_frequency + phase_offset).sin() * self.pulse_amplitude
    }

    /// Rigid rotation of the whole assembly: Y spins linearly, Z wobbles.
    pub fn group_rotation(&self, elapsed: f32) -> Mat4 {
        let rotation_y = elapsed * self.spin_speed;
        let rotation_z = (elapsed * self.wobble_frequency).sin() * self.wobble_amplitude;
        Mat4::from_rotation_y(rotation_y) * Mat4::from_rotation_z(rotation_z)
    }
}

// ============================================================================
// SPAWNING
// ============================================================================

/// Initial state of one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSeed {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Color,
    pub radius: f32,
    pub phase_offset: f32,
}

impl ParticleSeed {
    /// Draw every attribute independently and uniformly from its range.
    pub fn sample(params: &FieldParams, rng: &mut impl Rng) -> Self {
        let half = params.spawn_extent / 2.0;
        let half_speed = params.velocity_spread / 2.0;
        let mut symmetric = |h: f32| if h > 0.0 { rng.gen_range(-h..h) } else { 0.0 };

        let position = Vec3::new(symmetric(half.x), symmetric(half.y), symmetric(half.z));
        let velocity = Vec3::new(symmetric(half_speed), symmetric(half_speed), symmetric(half_speed));

        let color = params.palette.choose(rng).copied().unwrap_or(Color::WHITE);
        let phase_offset = if params.phase_max > 0.0 {
            rng.gen_range(0.0..params.phase_max)
        } else {
            0.0
        };
        let radius = if params.radius_max > params.radius_min {
            rng.gen_range(params.radius_min..params.radius_max)
        } else {
            params.radius_min
        };

        Self { position, velocity, color, radius, phase_offset }
    }
}

// ============================================================================
// FIELD
// ============================================================================

/// Read-only copy of one particle, ordered by spawn index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleView {
    pub index: usize,
    pub position: Vec3,
    pub color: Color,
    pub radius: f32,
    pub phase_offset: f32,
}

pub struct ParticleField {
    world: World,
    params: FieldParams,
    /// Snapshot refreshed after every step, sorted by spawn index.
    particles: Vec<ParticleView>,
    /// Scratch for the pair pass; same order as `particles`.
    positions: Vec<Vec3>,
    /// Pairs closer than the connection distance, this frame.
    connections: Vec<Connection>,
    /// Line-segment endpoints (x, y, z, x, y, z per connection) for the current frame.
    line_vertices: Vec<f32>,
    frames: u64,
}

impl ParticleField {
    /// Spawn `params.count` random particles.
    pub fn new(params: FieldParams, rng: &mut impl Rng) -> Self {
        let seeds = (0..params.count)
            .map(|_| ParticleSeed::sample(&params, rng))
            .collect();
        Self::from_seeds(params, seeds)
    }

    /// Spawn exactly the given particles, in order. `params.count` is ignored.
    pub fn from_seeds(params: FieldParams, seeds: Vec<ParticleSeed>) -> Self {
        let mut world = World::new();
        for (index, seed) in seeds.iter().enumerate() {
            world.spawn((
                Transform::from_position(seed.position),
                Velocity::new(seed.velocity),
                seed.color,
                Neuron {
                    index,
                    radius: seed.radius,
                    phase_offset: seed.phase_offset,
                },
            ));
        }

        debug!(count = seeds.len(), "spawned particle field");

        let mut field = Self {
            world,
            params,
            particles: Vec::with_capacity(seeds.len()),
            positions: Vec::with_capacity(seeds.len()),
            connections: Vec::new(),
            line_vertices: Vec::new(),
            frames: 0,
        };
        field.sync_snapshot();
        field
    }

    /// Advance one frame. `elapsed` is wall-clock seconds since the scene started.
    pub fn step(&mut self, elapsed: f32) {
        movement_system(&mut self.world);
        drift_system(&mut self.world, elapsed, self.params.drift_amplitude);
        reflection_system(&mut self.world, self.params.bounds);

        self.sync_snapshot();
        derive_connections(&self.positions, self.params.connection_distance, &mut self.connections);
        build_line_vertices(&self.positions, &self.connections, &mut self.line_vertices);
        self.frames += 1;
    }

    pub fn particles(&self) -> &[ParticleView] {
        &self.particles
    }

    /// Number of live particle entities in the world.
    pub fn particle_count(&self) -> usize {
        self.world.iter_entities().count()
    }

    pub fn line_vertices(&self) -> &[f32] {
        &self.line_vertices
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn sync_snapshot(&mut self) {
        self.particles.clear();
        let mut query = self.world.query::<(&Neuron, &Transform, &Color)>();
        for (neuron, transform, color) in query.iter(&self.world) {
            self.particles.push(ParticleView {
                index: neuron.index,
                position: transform.position,
                color: *color,
                radius: neuron.radius,
                phase_offset: neuron.phase_offset,
            });
        }
        self.particles.sort_unstable_by_key(|p| p.index);

        self.positions.clear();
        self.positions.extend(self.particles.iter().map(|p| p.position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn seeded_field(seed: u64) -> ParticleField {
        let mut rng = StdRng::seed_from_u64(seed);
        ParticleField::new(FieldParams::default(), &mut rng)
    }

    fn seed_at(position: Vec3, velocity: Vec3) -> ParticleSeed {
        ParticleSeed {
            position,
            velocity,
            color: Color::WHITE,
            radius: 0.1,
            phase_offset: 0.0,
        }
    }

    /// Velocities in spawn order, read straight from the world.
    fn velocities(field: &mut ParticleField) -> Vec<Vec3> {
        let mut query = field.world.query::<(&Neuron, &Velocity)>();
        let mut by_index: Vec<(usize, Vec3)> = query
            .iter(&field.world)
            .map(|(neuron, velocity)| (neuron.index, velocity.linear))
            .collect();
        by_index.sort_unstable_by_key(|(index, _)| *index);
        by_index.into_iter().map(|(_, v)| v).collect()
    }

    fn pair_field(second: Vec3) -> ParticleField {
        ParticleField::from_seeds(
            FieldParams::default(),
            vec![
                seed_at(Vec3::ZERO, Vec3::ZERO),
                seed_at(second, Vec3::ZERO),
            ],
        )
    }

    #[test]
    fn default_palette_parses_fully() {
        assert_eq!(FieldParams::default().palette.len(), DEFAULT_PALETTE.len());
    }

    #[test]
    fn particle_count_is_fixed() {
        let mut field = seeded_field(1);
        assert_eq!(field.particle_count(), 60);
        assert_eq!(field.particles().len(), 60);
        for frame in 0..500 {
            field.step(frame as f32 / 60.0);
        }
        assert_eq!(field.particle_count(), 60);
        assert_eq!(field.particles().len(), 60);
        assert_eq!(field.frames(), 500);
    }

    #[test]
    fn construction_without_steps_has_no_geometry() {
        let field = seeded_field(2);
        assert!(field.line_vertices().is_empty());
        assert_eq!(field.frames(), 0);
    }

    #[test]
    fn sampled_attributes_stay_in_range() {
        let mut field = seeded_field(3);
        let params = field.params().clone();
        let velocities = velocities(&mut field);
        for (i, p) in field.particles().iter().enumerate() {
            assert_eq!(p.index, i);
            assert!(p.position.abs().cmple(params.spawn_extent / 2.0).all());
            assert!(velocities[i].abs().max_element() <= params.velocity_spread / 2.0);
            assert!(p.radius >= 0.1 && p.radius < 0.22);
            assert!(p.phase_offset >= 0.0 && p.phase_offset < 10.0);
            assert!(params.palette.contains(&p.color));
        }
    }

    #[test]
    fn colors_never_change() {
        let mut field = seeded_field(4);
        let before: Vec<Color> = field.particles().iter().map(|p| p.color).collect();
        for frame in 0..200 {
            field.step(frame as f32 * 0.016);
        }
        let after: Vec<Color> = field.particles().iter().map(|p| p.color).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn velocities_only_flip_sign_and_only_past_bounds() {
        let mut field = seeded_field(5);
        let bounds = field.params().bounds;
        for frame in 0..2000 {
            let t = frame as f32 / 60.0;
            let before: Vec<ParticleView> = field.particles().to_vec();
            let old_velocities = velocities(&mut field);
            field.step(t);
            let new_velocities = velocities(&mut field);
            for (i, (old, new)) in before.iter().zip(field.particles()).enumerate() {
                // Recompute the pre-reflection position for this frame.
                let mut moved = old.position + old_velocities[i];
                moved.y += (t + moved.x).sin() * field.params().drift_amplitude;
                assert_eq!(new.position, moved);

                for axis in 0..3 {
                    if moved[axis].abs() > bounds[axis] {
                        assert_eq!(new_velocities[i][axis], -old_velocities[i][axis]);
                    } else {
                        assert_eq!(new_velocities[i][axis], old_velocities[i][axis]);
                    }
                }
            }
        }
    }

    #[test]
    fn particles_stay_near_the_soft_box() {
        let mut field = seeded_field(6);
        let bounds = field.params().bounds;
        for frame in 0..5000 {
            field.step(frame as f32 / 60.0);
        }
        let slack = Vec3::splat(1.0);
        for p in field.particles() {
            assert!(p.position.abs().cmple(bounds + slack).all(), "{:?}", p.position);
        }
    }

    #[test]
    fn close_pair_connects_after_one_step() {
        let mut field = pair_field(Vec3::new(3.0, 0.0, 0.0));
        field.step(0.0);
        assert_eq!(field.connections(), &[Connection { a: 0, b: 1 }]);
        let v = field.line_vertices();
        assert_eq!(v.len(), 6);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[3], 3.0);
    }

    #[test]
    fn distant_pair_has_no_connection() {
        let mut field = pair_field(Vec3::new(5.0, 0.0, 0.0));
        field.step(0.0);
        assert!(field.connections().is_empty());
        assert!(field.line_vertices().is_empty());
    }

    #[test]
    fn reflection_affects_next_frame_not_current() {
        let mut field = ParticleField::from_seeds(
            FieldParams::default(),
            vec![seed_at(Vec3::new(7.5, 0.0, 0.0), Vec3::new(0.01, 0.0, 0.0))],
        );
        field.step(0.0);
        assert_eq!(velocities(&mut field)[0].x, -0.01);
        assert!((field.particles()[0].position.x - 7.51).abs() < 1e-6);

        field.step(0.016);
        assert!((field.particles()[0].position.x - 7.50).abs() < 1e-6);
    }

    #[test]
    fn geometry_is_replaced_each_frame() {
        let mut field = ParticleField::from_seeds(
            FieldParams::default(),
            vec![
                seed_at(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(-0.5, 0.0, 0.0)),
                seed_at(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0)),
            ],
        );
        field.step(0.0);
        assert_eq!(field.connections().len(), 1);
        field.step(0.0);
        field.step(0.0);
        assert!(field.connections().is_empty());
        assert!(field.line_vertices().is_empty());
    }

    #[test]
    fn pulse_scale_is_bounded() {
        let params = FieldParams::default();
        for i in 0..1000 {
            let t = i as f32 * 0.037;
            let phase = (i % 100) as f32 * 0.1;
            let s = params.pulse_scale(t, phase);
            assert!((0.9..=1.1).contains(&s), "{s}");
        }
    }

    #[test]
    fn group_rotation_is_rigid() {
        let params = FieldParams::default();
        let m = params.group_rotation(12.3);
        let p = Vec3::new(3.0, -1.0, 2.0);
        let q = Vec3::new(-4.0, 0.5, 1.0);
        let before = p.distance(q);
        let after = m.transform_point3(p).distance(m.transform_point3(q));
        assert!((before - after).abs() < 1e-5);
        assert_eq!(params.group_rotation(0.0), Mat4::IDENTITY);
    }
}

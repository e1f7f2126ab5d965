// Background star shell behind the particle field.
//
// Stars are sampled once on a thick spherical shell around the origin and
// never move. They sit outside the rotating group; only their on-screen size
// breathes, by one shared factor for the whole shell.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

/// Grey level of every star (zero saturation).
pub const STAR_LIGHTNESS: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct StarParams {
    pub count: usize,
    /// Inner radius of the shell.
    pub radius: f32,
    /// Shell thickness; stars start at `radius + depth` and creep inward.
    pub depth: f32,
    /// Base point size; each star gets 0.5..1.0 of it.
    pub factor: f32,
    pub speed: f32,
}

impl Default for StarParams {
    fn default() -> Self {
        Self {
            count: 2000,
            radius: 100.0,
            depth: 50.0,
            factor: 4.0,
            speed: 1.0,
        }
    }
}

impl StarParams {
    /// Size multiplier shared by all stars at `elapsed`: 3 + sin(t * speed + 100).
    pub fn twinkle(&self, elapsed: f32) -> f32 {
        3.0 + (elapsed * self.speed + 100.0).sin()
    }
}

/// One star, laid out for direct upload as an instance.
///   @location(0) position: vec3<f32>
///   @location(1) size:     f32
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Star {
    pub position: [f32; 3],
    pub size: f32,
}

impl Star {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Star>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

/// Sample the shell. Directions are uniform on the sphere; the radius starts
/// at the outer edge and shrinks by a random fraction of `depth / count` per
/// star, so the whole set stays within [radius, radius + depth].
pub fn generate_stars(params: &StarParams, rng: &mut impl Rng) -> Vec<Star> {
    let step = if params.count > 0 { params.depth / params.count as f32 } else { 0.0 };
    let mut r = params.radius + params.depth;

    (0..params.count)
        .map(|_| {
            r -= step * rng.gen_range(0.0..1.0f32);
            let cos_theta = 1.0 - rng.gen_range(0.0..1.0f32) * 2.0;
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
            let phi = rng.gen_range(0.0..1.0f32) * TAU;
            let direction = Vec3::new(sin_theta * phi.sin(), cos_theta, sin_theta * phi.cos());
            Star {
                position: (direction * r).to_array(),
                size: (0.5 + 0.5 * rng.gen_range(0.0..1.0f32)) * params.factor,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn stars(seed: u64) -> Vec<Star> {
        generate_stars(&StarParams::default(), &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn shell_has_requested_count_and_thickness() {
        let params = StarParams::default();
        let stars = stars(11);
        assert_eq!(stars.len(), params.count);
        for star in &stars {
            let r = Vec3::from_array(star.position).length();
            assert!(r >= params.radius - 1e-3 && r <= params.radius + params.depth + 1e-3, "{r}");
        }
    }

    #[test]
    fn radius_only_shrinks_along_the_sequence() {
        let radii: Vec<f32> = stars(12)
            .iter()
            .map(|s| Vec3::from_array(s.position).length())
            .collect();
        assert!(radii.windows(2).all(|w| w[1] <= w[0] + 1e-3));
    }

    #[test]
    fn sizes_scale_with_factor() {
        let factor = StarParams::default().factor;
        assert!(stars(13).iter().all(|s| s.size >= 0.5 * factor && s.size <= factor));
    }

    #[test]
    fn same_seed_same_sky() {
        assert_eq!(stars(14), stars(14));
        assert_ne!(stars(14), stars(15));
    }

    #[test]
    fn directions_cover_both_hemispheres() {
        let stars = stars(16);
        let above = stars.iter().filter(|s| s.position[1] > 0.0).count();
        // Uniform on the sphere: roughly half above the equator.
        assert!((800..1200).contains(&above), "{above}");
    }

    #[test]
    fn empty_shell_is_fine() {
        let params = StarParams { count: 0, ..StarParams::default() };
        assert!(generate_stars(&params, &mut StdRng::seed_from_u64(0)).is_empty());
    }

    #[test]
    fn twinkle_stays_between_two_and_four() {
        let params = StarParams::default();
        for i in 0..500 {
            let k = params.twinkle(i as f32 * 0.05);
            assert!((2.0..=4.0).contains(&k), "{k}");
        }
    }
}

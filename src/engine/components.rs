// Core ECS components for the particle field
// Every particle entity carries exactly one of each

use bevy_ecs::prelude::*;
use glam::Vec3;

/// Position of a particle in field space (before the group rotation)
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position }
    }
}

/// sRGB color, one palette entry per particle
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    /// Parse a `#RRGGBB` (or `RRGGBB`) hex string.
    /// Channels stay in sRGB space; shaders linearise them.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).ok().map(|v| v as f32 / 255.0)
        };
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Velocity of a particle in field units per frame.
/// Only ever changes by per-axis sign flips (reflection).
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub linear: Vec3,
}

impl Velocity {
    pub fn new(linear: Vec3) -> Self {
        Self { linear }
    }
}

/// Per-particle constants sampled once at spawn.
///
/// `index`       : spawn order 0..N, defines connection pair ordering.
/// `radius`      : sphere radius in field units.
/// `phase_offset`: desynchronises the render-time pulse, no physical effect.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Neuron {
    pub index: usize,
    pub radius: f32,
    pub phase_offset: f32,
}

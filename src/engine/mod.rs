// Engine module - particle field simulation, project diagrams, rendering helpers

pub mod camera;
pub mod clock;
pub mod components;
pub mod connections;
pub mod diagrams;
pub mod field;
pub mod mesh;
pub mod overlay;
pub mod stars;
pub mod systems;

// Re-export commonly used items
pub use components::*;
pub use field::{DEFAULT_PALETTE, FieldParams, ParticleField};

//! Vector type alias for 2D world positions and velocities.

use nalgebra::Vector2;

/// 2D vector type for world positions and fluid velocities.
///
/// This is a simple alias for `nalgebra::Vector2<f32>`, used throughout
/// the simulation for organism positions, window corners and current vectors.
pub type Vec2 = Vector2<f32>;

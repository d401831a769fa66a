//! Fluid velocity input consumed by the advection pass

use crate::core_types::Vec2;

/// Source of fluid currents, sampled at world positions.
///
/// Implementations are queried from several solver tasks at once.
pub trait VelocityField: Send + Sync {
    /// Current velocity at a world position
    fn velocity_at(&self, world: Vec2) -> Vec2;
}

impl<F> VelocityField for F
where
    F: Fn(Vec2) -> Vec2 + Send + Sync,
{
    fn velocity_at(&self, world: Vec2) -> Vec2 {
        self(world)
    }
}

/// No currents anywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct StillWater;

impl VelocityField for StillWater {
    fn velocity_at(&self, _world: Vec2) -> Vec2 {
        Vec2::zeros()
    }
}

/// Same current everywhere
#[derive(Debug, Clone, Copy)]
pub struct UniformCurrent(pub Vec2);

impl VelocityField for UniformCurrent {
    fn velocity_at(&self, _world: Vec2) -> Vec2 {
        self.0
    }
}

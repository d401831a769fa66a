//! Tuning and geometry configuration for compound clouds
//!
//! All constants that shape the simulation (grid size, diffusion rate,
//! viscosity, thresholds) live here so the host game can load them from its
//! own settings files. Nothing in the solver hardcodes them.

use crate::core_types::CompoundId;
use crate::error::{CompoundGridError, Result};
use serde::{Deserialize, Serialize};

/// Configuration shared by every grid of a cloud manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompoundCloudConfig {
    /// Grid side length in cells
    pub size: usize,

    /// Sub-squares per side (S); `size` must be divisible by it
    pub sub_squares_per_side: usize,

    /// World units covered by one cell
    pub resolution: f32,

    /// Width in cells of the serially diffused strip along sub-square edges
    pub edge_width: usize,

    /// Diffusion coefficient `a = dt * diffusion_rate` (clamped to [0, 1])
    pub diffusion_rate: f32,

    /// Scale applied to sampled fluid velocities before advection
    pub viscosity: f32,

    /// Velocity components with smaller magnitude are treated as still water
    pub velocity_threshold: f32,

    /// Cells whose largest channel is at or below this stay in place during advection
    pub advection_min_density: f32,

    /// A take that would leave less than this drains the cell completely
    pub take_epsilon: f32,

    /// Fraction of a taken amount that actually reaches the absorber's storage
    pub absorption_ratio: f32,
}

impl Default for CompoundCloudConfig {
    fn default() -> Self {
        Self {
            size: 120,
            sub_squares_per_side: 3,
            resolution: 2.0,
            edge_width: 2,
            diffusion_rate: 0.4,
            viscosity: 0.0525,
            velocity_threshold: 0.01,
            advection_min_density: 0.001,
            take_epsilon: 0.01,
            absorption_ratio: 1.0,
        }
    }
}

impl CompoundCloudConfig {
    /// Side length of one sub-square in cells
    #[must_use]
    pub fn square_size(&self) -> usize {
        self.size / self.sub_squares_per_side
    }

    /// Check geometry and tuning values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(CompoundGridError::invalid_argument("size must be positive"));
        }
        if self.sub_squares_per_side == 0 {
            return Err(CompoundGridError::invalid_argument(
                "sub_squares_per_side must be positive",
            ));
        }
        if self.size % self.sub_squares_per_side != 0 {
            return Err(CompoundGridError::invalid_argument(format!(
                "size {} is not divisible by sub_squares_per_side {}",
                self.size, self.sub_squares_per_side
            )));
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(CompoundGridError::invalid_argument(format!(
                "resolution must be finite and positive, got {}",
                self.resolution
            )));
        }
        let non_negative = [
            ("diffusion_rate", self.diffusion_rate),
            ("velocity_threshold", self.velocity_threshold),
            ("advection_min_density", self.advection_min_density),
            ("take_epsilon", self.take_epsilon),
            ("absorption_ratio", self.absorption_ratio),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CompoundGridError::invalid_argument(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.viscosity.is_finite() {
            return Err(CompoundGridError::invalid_argument(format!(
                "viscosity must be finite, got {}",
                self.viscosity
            )));
        }
        Ok(())
    }
}

fn default_decay_rate() -> f32 {
    1.0
}

/// A simulated compound and its per-tick decay factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundSpec {
    pub id: CompoundId,
    /// Multiplicative factor applied to the compound each advection pass (1.0 = no decay)
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
}

impl CompoundSpec {
    #[must_use]
    pub fn new(id: CompoundId, decay_rate: f32) -> Self {
        Self { id, decay_rate }
    }

    /// Compound that never decays
    #[must_use]
    pub fn persistent(id: CompoundId) -> Self {
        Self::new(id, default_decay_rate())
    }
}

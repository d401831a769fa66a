//! Semi-Lagrangian forward advection with bilinear splatting
//!
//! Every cell with non-negligible density is pushed along the sampled fluid
//! velocity and its (decayed) record is distributed over the four cells around
//! the fractional destination:
//!
//! ```text
//! (fx, fy) = (x + dt·vx, y + dt·vy)
//! s1 = fx − ⌊fx⌋, s0 = 1 − s1      t1 = fy − ⌊fy⌋, t0 = 1 − t1
//! out[x0, y0] += v·s0·t0   out[x1, y0] += v·s1·t0
//! out[x0, y1] += v·s0·t1   out[x1, y1] += v·s1·t1
//! ```
//!
//! Destinations may land in another task's sub-square, so all writes into the
//! output field are atomic accumulations.

use super::velocity::VelocityField;
use crate::core_types::{ChannelDensity, Vec2};
use crate::grid::{CellRegion, DensityField, ToroidalWindow};

/// Parameters for one advection pass
#[derive(Debug, Clone, Copy)]
pub struct AdvectionParams {
    /// Timestep in seconds
    pub dt: f32,
    /// Scale applied to sampled velocities
    pub viscosity: f32,
    /// Velocity components below this magnitude are zeroed
    pub velocity_threshold: f32,
    /// Cells whose largest channel is at or below this are not moved
    pub min_density: f32,
    /// Per-channel multiplicative decay
    pub decay: ChannelDensity,
}

#[inline]
fn threshold(component: f32, limit: f32) -> f32 {
    if component.abs() < limit {
        0.0
    } else {
        component
    }
}

/// Advect every cell of `region` from `source` into `target`.
///
/// `target` must already be cleared over the whole grid; contributions are
/// added with per-channel compare-and-swap so concurrent tasks may overlap.
pub fn advect_region(
    source: &DensityField,
    target: &DensityField,
    region: CellRegion,
    window: &ToroidalWindow,
    velocity: &dyn VelocityField,
    params: &AdvectionParams,
) {
    let size = source.size() as i64;

    for (x, y) in region.cells() {
        let value = source.get(x, y).scaled_per_channel(&params.decay);
        if value.max_channel() <= params.min_density {
            // Too little to be worth moving; keep it where it is
            target.accumulate(x, y, value);
            continue;
        }

        let raw = velocity.velocity_at(window.local_to_world(x, y));
        let v = Vec2::new(
            threshold(raw.x, params.velocity_threshold),
            threshold(raw.y, params.velocity_threshold),
        ) * params.viscosity;

        let fx = x as f32 + params.dt * v.x;
        let fy = y as f32 + params.dt * v.y;
        let floor_x = fx.floor();
        let floor_y = fy.floor();

        let s1 = fx - floor_x;
        let s0 = 1.0 - s1;
        let t1 = fy - floor_y;
        let t0 = 1.0 - t1;

        let x0 = (floor_x as i64).rem_euclid(size) as usize;
        let y0 = (floor_y as i64).rem_euclid(size) as usize;
        let x1 = (x0 + 1) % size as usize;
        let y1 = (y0 + 1) % size as usize;

        for (tx, ty, weight) in [
            (x0, y0, s0 * t0),
            (x1, y0, s1 * t0),
            (x0, y1, s0 * t1),
            (x1, y1, s1 * t1),
        ] {
            if weight > 0.0 {
                target.accumulate(tx, ty, value.scaled(weight));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::velocity::{StillWater, UniformCurrent};
    use approx::assert_relative_eq;

    fn params(dt: f32) -> AdvectionParams {
        AdvectionParams {
            dt,
            viscosity: 1.0,
            velocity_threshold: 0.01,
            min_density: 0.001,
            decay: ChannelDensity::splat(1.0),
        }
    }

    fn full(size: usize) -> CellRegion {
        CellRegion::new(0, 0, size, size)
    }

    #[test]
    fn test_still_water_copies_field() {
        let window = ToroidalWindow::new(12, 3, 1.0);
        let source = DensityField::new(12);
        let target = DensityField::new(12);
        source.set(3, 7, ChannelDensity([2.0, 0.0, 5.0, 0.0]));
        source.set(8, 1, ChannelDensity([0.0005, 0.0, 0.0, 0.0]));

        advect_region(&source, &target, full(12), &window, &StillWater, &params(1.0));

        assert_eq!(target.get(3, 7), ChannelDensity([2.0, 0.0, 5.0, 0.0]));
        assert_eq!(target.get(8, 1)[0], 0.0005);
    }

    #[test]
    fn test_half_cell_shift_splits_evenly() {
        let window = ToroidalWindow::new(12, 3, 1.0);
        let source = DensityField::new(12);
        let target = DensityField::new(12);
        source.set(11, 4, ChannelDensity([8.0, 0.0, 0.0, 0.0]));

        let current = UniformCurrent(Vec2::new(0.5, 0.0));
        advect_region(&source, &target, full(12), &window, &current, &params(1.0));

        // Destination 11.5 straddles the wrap seam
        assert_relative_eq!(target.get(11, 4)[0], 4.0, epsilon = 1e-5);
        assert_relative_eq!(target.get(0, 4)[0], 4.0, epsilon = 1e-5);
        assert_relative_eq!(target.total(0), 8.0, epsilon = 1e-5);
    }

    #[test]
    fn test_negative_velocity_wraps_backwards() {
        let window = ToroidalWindow::new(12, 3, 1.0);
        let source = DensityField::new(12);
        let target = DensityField::new(12);
        source.set(0, 0, ChannelDensity([0.0, 1.0, 0.0, 0.0]));

        let current = UniformCurrent(Vec2::new(-1.0, -2.0));
        advect_region(&source, &target, full(12), &window, &current, &params(1.0));

        assert_relative_eq!(target.get(11, 10)[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_small_velocity_thresholded() {
        let window = ToroidalWindow::new(12, 3, 1.0);
        let source = DensityField::new(12);
        let target = DensityField::new(12);
        source.set(6, 6, ChannelDensity::splat(1.0));

        let current = UniformCurrent(Vec2::new(0.005, -0.005));
        advect_region(&source, &target, full(12), &window, &current, &params(1.0));

        assert_eq!(target.get(6, 6), ChannelDensity::splat(1.0));
    }

    #[test]
    fn test_decay_applied_per_channel() {
        let window = ToroidalWindow::new(12, 3, 1.0);
        let source = DensityField::new(12);
        let target = DensityField::new(12);
        source.set(2, 2, ChannelDensity::splat(10.0));

        let mut p = params(1.0);
        p.decay = ChannelDensity([1.0, 0.5, 0.9, 0.0]);
        advect_region(&source, &target, full(12), &window, &StillWater, &p);

        let out = target.get(2, 2);
        assert_relative_eq!(out[0], 10.0);
        assert_relative_eq!(out[1], 5.0);
        assert_relative_eq!(out[2], 9.0);
        assert_eq!(out[3], 0.0);
    }
}

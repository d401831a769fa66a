//! Toroidal diffusion kernel
//!
//! ```text
//! out[x, y] = in[x, y]·(1 − a) + (in[x±1, y] + in[x, y±1])·(a / 4)
//! ```
//!
//! Applied per channel independently with wraparound neighbour indices, so the
//! grid behaves as a torus. Always reads one field and writes another; never
//! computed in place.

use crate::core_types::ChannelDensity;
use crate::grid::{CellRegion, DensityField};

/// Parameters for one diffusion pass
#[derive(Debug, Clone, Copy)]
pub struct DiffusionParams {
    /// Diffusion coefficient `a` in [0, 1]
    pub coefficient: f32,
}

impl DiffusionParams {
    /// `a = dt × rate`, clamped so the centre weight never goes negative.
    ///
    /// Returns the params and whether clamping happened.
    #[must_use]
    pub fn from_rate(dt: f32, diffusion_rate: f32) -> (Self, bool) {
        let raw = dt * diffusion_rate;
        let coefficient = raw.clamp(0.0, 1.0);
        (Self { coefficient }, coefficient != raw)
    }
}

/// Diffuse every cell of `region`, reading `source` and writing `target`.
///
/// Both fields must have the same size. Tasks working on disjoint regions
/// may run concurrently on the same pair of fields.
pub fn diffuse_region(
    source: &DensityField,
    target: &DensityField,
    region: CellRegion,
    params: DiffusionParams,
) {
    let size = source.size();
    let a = params.coefficient;
    let keep = 1.0 - a;
    let spread = a / 4.0;

    for (x, y) in region.cells() {
        let left = (x + size - 1) % size;
        let right = (x + 1) % size;
        let up = (y + size - 1) % size;
        let down = (y + 1) % size;

        let neighbours: ChannelDensity = source.get(left, y)
            + source.get(right, y)
            + source.get(x, up)
            + source.get(x, down);

        target.set(x, y, source.get(x, y).scaled(keep) + neighbours.scaled(spread));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn full(size: usize) -> CellRegion {
        CellRegion::new(0, 0, size, size)
    }

    #[test]
    fn test_point_source_spreads_to_neighbours() {
        let source = DensityField::new(12);
        let target = DensityField::new(12);
        source.set(5, 5, ChannelDensity([10.0, 0.0, 0.0, 0.0]));

        diffuse_region(&source, &target, full(12), DiffusionParams { coefficient: 0.4 });

        assert_relative_eq!(target.get(5, 5)[0], 6.0, epsilon = 1e-5);
        for (x, y) in [(4, 5), (6, 5), (5, 4), (5, 6)] {
            assert_relative_eq!(target.get(x, y)[0], 1.0, epsilon = 1e-5);
        }
        assert_eq!(target.get(4, 4)[0], 0.0);
    }

    #[test]
    fn test_corner_wraps_around() {
        let source = DensityField::new(8);
        let target = DensityField::new(8);
        source.set(0, 0, ChannelDensity([0.0, 4.0, 0.0, 0.0]));

        diffuse_region(&source, &target, full(8), DiffusionParams { coefficient: 1.0 });

        for (x, y) in [(7, 0), (1, 0), (0, 7), (0, 1)] {
            assert_relative_eq!(target.get(x, y)[1], 1.0, epsilon = 1e-6);
        }
        assert_relative_eq!(target.total(1), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_region_limits_writes() {
        let source = DensityField::new(6);
        let target = DensityField::new(6);
        source.set(2, 2, ChannelDensity::splat(1.0));

        diffuse_region(
            &source,
            &target,
            CellRegion::new(0, 0, 3, 3),
            DiffusionParams { coefficient: 0.5 },
        );

        // (3, 2) would receive density but lies outside the region
        assert_eq!(target.get(3, 2), ChannelDensity::ZERO);
        assert_relative_eq!(target.get(1, 2)[2], 0.125, epsilon = 1e-6);
    }

    #[test]
    fn test_coefficient_clamped() {
        let (params, clamped) = DiffusionParams::from_rate(10.0, 0.5);
        assert!(clamped);
        assert_eq!(params.coefficient, 1.0);

        let (params, clamped) = DiffusionParams::from_rate(1.0, 0.4);
        assert!(!clamped);
        assert_relative_eq!(params.coefficient, 0.4);
    }
}

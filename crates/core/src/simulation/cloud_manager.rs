//! Cloud manager routing compounds to grids
//!
//! `CompoundCloudManager` owns one [`CompoundGrid`] per group of four
//! compounds, keeps every grid centred on the tracked entity, and forwards
//! world-coordinate requests to the grid and channel that simulate a compound.

use crate::config::{CompoundCloudConfig, CompoundSpec};
use crate::core_types::{CompoundId, Vec2, CHANNEL_COUNT};
use crate::error::{CompoundGridError, Result};
use crate::grid::{CompoundGrid, CompoundStorage, SquareCoord, ToroidalWindow};
use crate::solver::{ProfilerScope, TaskRunner, VelocityField};
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::{debug, info, trace, warn};

/// Timings of one manager tick, summed over all grids
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    pub grids: usize,
    pub diffusion_edges_ms: f64,
    pub diffusion_interior_ms: f64,
    pub advection_ms: f64,
    pub total_ms: f64,
}

/// Owner of every compound grid
#[derive(Debug)]
pub struct CompoundCloudManager {
    config: CompoundCloudConfig,
    grids: Vec<CompoundGrid>,
    /// compound -> (grid index, channel)
    routes: FxHashMap<CompoundId, (usize, usize)>,
    /// Window every grid is anchored on
    window: ToroidalWindow,
}

impl CompoundCloudManager {
    /// Build grids for `compounds`, four per grid in the given order.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid configuration, a duplicated compound,
    /// or a decay rate outside `[0, 1]`.
    pub fn new(config: &CompoundCloudConfig, compounds: &[CompoundSpec]) -> Result<Self> {
        config.validate()?;

        let mut routes = FxHashMap::with_capacity_and_hasher(compounds.len(), FxBuildHasher);
        let mut grids = Vec::with_capacity(compounds.len().div_ceil(CHANNEL_COUNT));

        for (grid_index, chunk) in compounds.chunks(CHANNEL_COUNT).enumerate() {
            let mut ids = [None; CHANNEL_COUNT];
            let mut decay = [1.0; CHANNEL_COUNT];
            for (channel, spec) in chunk.iter().enumerate() {
                if routes.insert(spec.id, (grid_index, channel)).is_some() {
                    return Err(CompoundGridError::invalid_argument(format!(
                        "{} configured more than once",
                        spec.id
                    )));
                }
                ids[channel] = Some(spec.id);
                decay[channel] = spec.decay_rate;
            }
            grids.push(CompoundGrid::new(config, ids, decay)?);
        }

        info!(
            "Compound cloud manager initialized: {} compounds over {} grids of {}x{} cells",
            compounds.len(),
            grids.len(),
            config.size,
            config.size
        );

        Ok(Self {
            config: config.clone(),
            grids,
            routes,
            window: ToroidalWindow::new(
                config.size,
                config.sub_squares_per_side,
                config.resolution,
            ),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CompoundCloudConfig {
        &self.config
    }

    #[must_use]
    pub fn grids(&self) -> &[CompoundGrid] {
        &self.grids
    }

    /// Sub-square every grid is anchored on
    #[must_use]
    pub fn anchor(&self) -> SquareCoord {
        self.window.anchor()
    }

    /// Whether some grid simulates `compound`
    #[must_use]
    pub fn has_compound(&self, compound: CompoundId) -> bool {
        self.routes.contains_key(&compound)
    }

    fn route(&self, compound: CompoundId) -> Result<(&CompoundGrid, usize)> {
        let &(grid, channel) = self
            .routes
            .get(&compound)
            .ok_or(CompoundGridError::UnknownCompound(compound))?;
        Ok((&self.grids[grid], channel))
    }

    /// Run one full solver tick on every grid
    pub fn tick(
        &self,
        dt: f32,
        runner: &dyn TaskRunner,
        velocity: &dyn VelocityField,
    ) -> TickStats {
        let total = ProfilerScope::new("tick");
        let mut stats = TickStats {
            grids: self.grids.len(),
            ..TickStats::default()
        };

        for grid in &self.grids {
            let scope = ProfilerScope::new("diffusion_edges");
            grid.step_diffusion_edges(dt);
            stats.diffusion_edges_ms += scope.finish();

            let scope = ProfilerScope::new("diffusion_interior");
            grid.step_diffusion_interior_parallel(dt, runner);
            stats.diffusion_interior_ms += scope.finish();

            let scope = ProfilerScope::new("advection");
            grid.step_advection_parallel(dt, runner, velocity);
            stats.advection_ms += scope.finish();
        }

        stats.total_ms = total.finish();
        debug!(
            "Cloud tick: dt={:.3}s, grids={}, edges={:.2}ms, interior={:.2}ms, advection={:.2}ms",
            dt,
            stats.grids,
            stats.diffusion_edges_ms,
            stats.diffusion_interior_ms,
            stats.advection_ms
        );
        stats
    }

    /// Follow the tracked entity to `world`.
    ///
    /// Jumps of more than one sub-square are replayed one step at a time; a
    /// jump of a whole window or more clears every grid instead. Returns
    /// whether the anchor changed.
    ///
    /// # Errors
    ///
    /// Propagates grid repositioning errors.
    pub fn update_anchor(&mut self, world: Vec2) -> Result<bool> {
        let anchor = self.window.anchor();
        let target = self.window.square_of(world);
        let dx = target.x - anchor.x;
        let dy = target.y - anchor.y;
        if dx == 0 && dy == 0 {
            return Ok(false);
        }

        let window = self.config.sub_squares_per_side as i64;
        if dx.abs() >= window || dy.abs() >= window {
            warn!(
                "Anchor jumped by ({}, {}) sub-squares; clearing all compound clouds",
                dx, dy
            );
            for grid in &mut self.grids {
                grid.reset_anchor(target);
            }
            self.window.reset_anchor(target);
            return Ok(true);
        }

        if dx.abs() > 1 || dy.abs() > 1 {
            warn!(
                "Anchor jumped by ({}, {}) sub-squares; replaying single steps",
                dx, dy
            );
        }

        while self.window.anchor() != target {
            let current = self.window.anchor();
            let next = SquareCoord::new(
                current.x + (target.x - current.x).signum(),
                current.y + (target.y - current.y).signum(),
            );
            for grid in &mut self.grids {
                grid.reposition(next)?;
            }
            self.window.reposition(next)?;
            trace!(from = ?current, to = ?next, "anchor stepped");
        }
        Ok(true)
    }

    /// Whether `world` lies inside the simulated window
    #[must_use]
    pub fn contains(&self, world: Vec2) -> bool {
        self.grids
            .first()
            .is_some_and(|grid| grid.contains(world).is_some())
    }

    /// Add `amount` of `compound` at a world position.
    ///
    /// Returns `false` without changing anything when the position is outside
    /// the window.
    ///
    /// # Errors
    ///
    /// `UnknownCompound`.
    pub fn add_compound(&self, compound: CompoundId, world: Vec2, amount: f32) -> Result<bool> {
        let (grid, channel) = self.route(compound)?;
        let Some((x, y)) = grid.contains(world) else {
            return Ok(false);
        };
        grid.add(channel, x, y, amount)?;
        Ok(true)
    }

    /// Take `fraction` of `compound` at a world position, retrying until the
    /// swap lands. Returns the amount taken (0 outside the window).
    ///
    /// # Errors
    ///
    /// `UnknownCompound` or `InvalidArgument` for a negative fraction.
    pub fn take_compound(&self, compound: CompoundId, world: Vec2, fraction: f32) -> Result<f32> {
        let (grid, channel) = self.route(compound)?;
        let Some((x, y)) = grid.contains(world) else {
            return Ok(0.0);
        };
        loop {
            let current = grid.density(channel, x, y)?;
            if current <= 0.0 {
                return Ok(0.0);
            }
            let (taken, success) = grid.take(channel, x, y, fraction, current)?;
            if success {
                return Ok(taken);
            }
        }
    }

    /// `fraction` of the `compound` held at a world position (0 outside the window)
    ///
    /// # Errors
    ///
    /// `UnknownCompound`.
    pub fn amount_available(&self, compound: CompoundId, world: Vec2, fraction: f32) -> Result<f32> {
        let (grid, channel) = self.route(compound)?;
        match grid.contains(world) {
            Some((x, y)) => grid.amount_available(channel, x, y, fraction),
            None => Ok(0.0),
        }
    }

    /// Absorb from every window cell whose centre lies within `radius` of
    /// `world`, across all grids.
    ///
    /// Returns the total taken from the clouds per compound.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a non-finite position, a negative or non-finite
    /// radius, a negative fraction, or a storage reporting negative free space.
    pub fn absorb_in_radius(
        &self,
        world: Vec2,
        radius: f32,
        storage: &mut dyn CompoundStorage,
        fraction: f32,
    ) -> Result<FxHashMap<CompoundId, f32>> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(CompoundGridError::invalid_argument(format!(
                "absorb radius must be finite and non-negative, got {radius}"
            )));
        }
        if !(world.x.is_finite() && world.y.is_finite()) {
            return Err(CompoundGridError::invalid_argument(format!(
                "absorb position must be finite, got ({}, {})",
                world.x, world.y
            )));
        }

        let mut totals = FxHashMap::default();
        let resolution = self.config.resolution;
        let radius_sq = radius * radius;
        let reach = (radius / resolution).ceil() as i64;
        let centre = (world / resolution).map(|v| v.floor() as i64);

        // Only cells inside the window can hold anything
        let size = self.config.size as i64;
        let corner = (self.window.world_anchor_position() / resolution).map(|v| v.round() as i64);
        let x_range = centre.x.saturating_sub(reach).max(corner.x)
            ..=centre.x.saturating_add(reach).min(corner.x + size - 1);
        let y_range = centre.y.saturating_sub(reach).max(corner.y)
            ..=centre.y.saturating_add(reach).min(corner.y + size - 1);

        for cy in y_range {
            for cx in x_range.clone() {
                let point = Vec2::new(cx as f32 + 0.5, cy as f32 + 0.5) * resolution;
                if (point - world).norm_squared() > radius_sq {
                    continue;
                }
                for grid in &self.grids {
                    let Some((x, y)) = grid.contains(point) else {
                        continue;
                    };
                    let absorbed = grid.absorb(x, y, storage, fraction)?;
                    for (channel, compound) in grid.compounds().iter().enumerate() {
                        if let Some(compound) = compound {
                            if absorbed[channel] > 0.0 {
                                *totals.entry(*compound).or_insert(0.0) += absorbed[channel];
                            }
                        }
                    }
                }
            }
        }
        Ok(totals)
    }

    /// Closest cell centre within `radius` of `world` holding at least
    /// `min_amount` of `compound`
    ///
    /// # Errors
    ///
    /// `UnknownCompound` or `InvalidArgument` for a negative radius.
    pub fn find_compound_near(
        &self,
        compound: CompoundId,
        world: Vec2,
        radius: f32,
        min_amount: f32,
    ) -> Result<Option<Vec2>> {
        let (grid, channel) = self.route(compound)?;
        grid.nearest_point_with_channel_above(world, channel, radius, min_amount)
    }

    /// Total amount of `compound` currently in the window
    ///
    /// # Errors
    ///
    /// `UnknownCompound`.
    pub fn total_compound(&self, compound: CompoundId) -> Result<f64> {
        let (grid, channel) = self.route(compound)?;
        grid.total_density(channel)
    }

    /// Remove every compound from every grid
    pub fn clear(&self) {
        for grid in &self.grids {
            grid.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CompoundBag;
    use crate::solver::{SerialTaskRunner, StillWater};
    use approx::assert_relative_eq;

    fn config() -> CompoundCloudConfig {
        CompoundCloudConfig {
            size: 12,
            sub_squares_per_side: 3,
            resolution: 1.0,
            edge_width: 1,
            ..Default::default()
        }
    }

    fn specs(count: u16) -> Vec<CompoundSpec> {
        (0..count)
            .map(|i| CompoundSpec::persistent(CompoundId(i)))
            .collect()
    }

    #[test]
    fn test_compounds_chunked_into_grids() {
        let manager = CompoundCloudManager::new(&config(), &specs(9)).unwrap();
        assert_eq!(manager.grids().len(), 3);
        assert_eq!(
            manager.grids()[2].compounds(),
            &[Some(CompoundId(8)), None, None, None]
        );
        assert_eq!(manager.grids()[1].channel_of(CompoundId(5)), Some(1));
    }

    #[test]
    fn test_duplicate_compound_rejected() {
        let specs = [
            CompoundSpec::persistent(CompoundId(1)),
            CompoundSpec::persistent(CompoundId(1)),
        ];
        assert!(matches!(
            CompoundCloudManager::new(&config(), &specs),
            Err(CompoundGridError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unknown_compound() {
        let manager = CompoundCloudManager::new(&config(), &specs(2)).unwrap();
        assert_eq!(
            manager.add_compound(CompoundId(42), Vec2::zeros(), 1.0),
            Err(CompoundGridError::UnknownCompound(CompoundId(42)))
        );
    }

    #[test]
    fn test_add_and_take_routed_by_compound() {
        let manager = CompoundCloudManager::new(&config(), &specs(6)).unwrap();
        let here = Vec2::new(1.5, -2.5);

        assert!(manager.add_compound(CompoundId(5), here, 4.0).unwrap());
        assert_relative_eq!(manager.total_compound(CompoundId(5)).unwrap(), 4.0);
        assert_eq!(manager.total_compound(CompoundId(1)).unwrap(), 0.0);
        assert_relative_eq!(
            manager.amount_available(CompoundId(5), here, 0.5).unwrap(),
            2.0
        );

        let taken = manager.take_compound(CompoundId(5), here, 0.25).unwrap();
        assert_relative_eq!(taken, 1.0);
        assert_relative_eq!(manager.total_compound(CompoundId(5)).unwrap(), 3.0);
    }

    #[test]
    fn test_outside_window_is_ignored() {
        let manager = CompoundCloudManager::new(&config(), &specs(1)).unwrap();
        let far = Vec2::new(500.0, 0.0);
        assert!(!manager.contains(far));
        assert!(!manager.add_compound(CompoundId(0), far, 1.0).unwrap());
        assert_eq!(manager.take_compound(CompoundId(0), far, 1.0).unwrap(), 0.0);
        assert_eq!(manager.total_compound(CompoundId(0)).unwrap(), 0.0);
    }

    #[test]
    fn test_update_anchor_single_step() {
        let mut manager = CompoundCloudManager::new(&config(), &specs(1)).unwrap();
        assert!(!manager.update_anchor(Vec2::new(1.0, 1.0)).unwrap());
        // Sub-squares are 4 world units wide
        assert!(manager.update_anchor(Vec2::new(5.0, 1.0)).unwrap());
        assert_eq!(manager.anchor(), SquareCoord::new(1, 0));
        assert_eq!(manager.grids()[0].window().anchor(), SquareCoord::new(1, 0));
    }

    #[test]
    fn test_update_anchor_replays_two_steps() {
        let mut manager = CompoundCloudManager::new(&config(), &specs(1)).unwrap();
        // Inside the window both before and after the move
        let kept = Vec2::new(4.5, 0.5);
        manager.add_compound(CompoundId(0), kept, 2.0).unwrap();

        assert!(manager.update_anchor(Vec2::new(9.0, 0.0)).unwrap());
        assert_eq!(manager.anchor(), SquareCoord::new(2, 0));
        assert_relative_eq!(
            manager.amount_available(CompoundId(0), kept, 1.0).unwrap(),
            2.0
        );
    }

    #[test]
    fn test_update_anchor_without_grids() {
        let mut manager = CompoundCloudManager::new(&config(), &[]).unwrap();
        assert!(manager.update_anchor(Vec2::new(-0.5, 9.0)).unwrap());
        assert_eq!(manager.anchor(), SquareCoord::new(-1, 2));
        assert!(!manager.update_anchor(Vec2::new(-3.0, 11.5)).unwrap());
    }

    #[test]
    fn test_update_anchor_far_jump_clears() {
        let mut manager = CompoundCloudManager::new(&config(), &specs(1)).unwrap();
        manager.add_compound(CompoundId(0), Vec2::zeros(), 2.0).unwrap();
        assert!(manager.update_anchor(Vec2::new(100.0, 100.0)).unwrap());
        assert_eq!(manager.anchor(), SquareCoord::new(25, 25));
        assert_eq!(manager.total_compound(CompoundId(0)).unwrap(), 0.0);
        assert!(manager.contains(Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn test_absorb_in_radius_collects_across_grids() {
        let manager = CompoundCloudManager::new(&config(), &specs(5)).unwrap();
        let centre = Vec2::new(0.5, 0.5);
        manager.add_compound(CompoundId(0), centre, 1.0).unwrap();
        manager
            .add_compound(CompoundId(4), Vec2::new(1.5, 0.5), 2.0)
            .unwrap();
        // Outside the radius
        manager
            .add_compound(CompoundId(4), Vec2::new(3.5, 0.5), 5.0)
            .unwrap();

        let mut bag = CompoundBag::new(100.0).unwrap();
        let totals = manager
            .absorb_in_radius(centre, 1.2, &mut bag, 1.0)
            .unwrap();

        assert_relative_eq!(totals[&CompoundId(0)], 1.0);
        assert_relative_eq!(totals[&CompoundId(4)], 2.0);
        assert_relative_eq!(bag.amount(CompoundId(4)), 2.0);
        assert_relative_eq!(manager.total_compound(CompoundId(4)).unwrap(), 5.0);
    }

    #[test]
    fn test_absorb_in_radius_rejects_non_finite_input() {
        let manager = CompoundCloudManager::new(&config(), &specs(1)).unwrap();
        let mut bag = CompoundBag::new(10.0).unwrap();
        for radius in [f32::INFINITY, f32::NAN, -1.0] {
            assert!(matches!(
                manager.absorb_in_radius(Vec2::zeros(), radius, &mut bag, 1.0),
                Err(CompoundGridError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            manager.absorb_in_radius(Vec2::new(f32::NAN, 0.0), 1.0, &mut bag, 1.0),
            Err(CompoundGridError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_absorb_in_radius_huge_radius_covers_window_once() {
        let manager = CompoundCloudManager::new(&config(), &specs(1)).unwrap();
        // Opposite corners of the window spanning [-4, 8)
        manager
            .add_compound(CompoundId(0), Vec2::new(-3.5, -3.5), 1.0)
            .unwrap();
        manager
            .add_compound(CompoundId(0), Vec2::new(7.5, 7.5), 2.0)
            .unwrap();

        let mut bag = CompoundBag::new(100.0).unwrap();
        let totals = manager
            .absorb_in_radius(Vec2::new(1.0e5, -2.0e5), 1.0e6, &mut bag, 1.0)
            .unwrap();

        assert_relative_eq!(totals[&CompoundId(0)], 3.0);
        assert_relative_eq!(bag.amount(CompoundId(0)), 3.0);
        assert_eq!(manager.total_compound(CompoundId(0)).unwrap(), 0.0);
    }

    #[test]
    fn test_find_compound_near() {
        let manager = CompoundCloudManager::new(&config(), &specs(1)).unwrap();
        manager
            .add_compound(CompoundId(0), Vec2::new(2.5, 2.5), 3.0)
            .unwrap();
        let found = manager
            .find_compound_near(CompoundId(0), Vec2::new(0.5, 0.5), 4.0, 1.0)
            .unwrap();
        assert_eq!(found, Some(Vec2::new(2.5, 2.5)));
    }

    #[test]
    fn test_tick_reports_every_grid() {
        let manager = CompoundCloudManager::new(&config(), &specs(5)).unwrap();
        manager
            .add_compound(CompoundId(4), Vec2::new(0.5, 0.5), 10.0)
            .unwrap();
        let stats = manager.tick(1.0, &SerialTaskRunner, &StillWater);
        assert_eq!(stats.grids, 2);
        assert!(stats.total_ms >= 0.0);
        assert_relative_eq!(
            manager.total_compound(CompoundId(4)).unwrap(),
            10.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_clear() {
        let manager = CompoundCloudManager::new(&config(), &specs(2)).unwrap();
        manager
            .add_compound(CompoundId(1), Vec2::new(1.0, 1.0), 1.0)
            .unwrap();
        manager.clear();
        assert_eq!(manager.total_compound(CompoundId(1)).unwrap(), 0.0);
    }
}

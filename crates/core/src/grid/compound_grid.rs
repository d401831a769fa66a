//! Toroidal compound density grid
//!
//! One [`CompoundGrid`] simulates up to four compounds over a square window
//! of the world. It owns two density buffers:
//!
//! - `density`: the authoritative values, read and mutated by organisms at
//!   any time through [`CompoundGrid::add`] and [`CompoundGrid::take`]
//! - `previous_density`: diffusion output and advection input, private to the
//!   solver
//!
//! Every slot is an atomic `f32`, so solver passes and point mutations all
//! work through `&self`. Only repositioning needs `&mut self`, which keeps the
//! zeroing of scrolled-in territory from interleaving with a solver pass.
//!
//! # Tick order
//!
//! ```text
//! step_diffusion_edges          density -> previous   (serial)
//! step_diffusion_interior_...   density -> previous   (one task per sub-square)
//! step_advection_parallel       clear density, then previous -> density (atomic splats)
//! ```

use super::fields::{CellRegion, DensityField};
use super::window::{SquareCoord, ToroidalWindow};
use crate::config::CompoundCloudConfig;
use crate::core_types::{ChannelDensity, CompoundId, Vec2, CHANNEL_COUNT};
use crate::error::{CompoundGridError, Result};
use crate::solver::{
    advect_region, diffuse_region, AdvectionParams, DiffusionParams, SubSquarePartition, Task,
    TaskRunner, VelocityField,
};
use std::sync::atomic::Ordering;
use tracing::{info, trace, warn};

/// Square toroidal grid of up to four compound density channels
#[derive(Debug)]
pub struct CompoundGrid {
    config: CompoundCloudConfig,
    /// Compound bound to each channel slot
    compounds: [Option<CompoundId>; CHANNEL_COUNT],
    decay_rates: ChannelDensity,
    density: DensityField,
    previous_density: DensityField,
    window: ToroidalWindow,
    partition: SubSquarePartition,
}

impl CompoundGrid {
    /// Create a grid for up to four compounds.
    ///
    /// Unused channel slots are `None`; their decay rate is ignored.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the configuration is invalid or a decay rate lies
    /// outside `[0, 1]`.
    pub fn new(
        config: &CompoundCloudConfig,
        compounds: [Option<CompoundId>; CHANNEL_COUNT],
        decay_rates: [f32; CHANNEL_COUNT],
    ) -> Result<Self> {
        config.validate()?;
        for (channel, &rate) in decay_rates.iter().enumerate() {
            if compounds[channel].is_some() && !(0.0..=1.0).contains(&rate) {
                return Err(CompoundGridError::invalid_argument(format!(
                    "decay rate {rate} of channel {channel} must lie in [0, 1]"
                )));
            }
        }
        for (i, a) in compounds.iter().enumerate() {
            if a.is_some() && compounds[i + 1..].contains(a) {
                return Err(CompoundGridError::invalid_argument(format!(
                    "{} bound to more than one channel",
                    a.map_or_else(String::new, |id| id.to_string())
                )));
            }
        }

        let size = config.size;
        info!(
            "Creating compound grid: {}x{} cells, {}x{} sub-squares, resolution={:.2}, compounds={:?}",
            size,
            size,
            config.sub_squares_per_side,
            config.sub_squares_per_side,
            config.resolution,
            compounds
        );

        Ok(Self {
            config: config.clone(),
            compounds,
            decay_rates: ChannelDensity(decay_rates),
            density: DensityField::new(size),
            previous_density: DensityField::new(size),
            window: ToroidalWindow::new(size, config.sub_squares_per_side, config.resolution),
            partition: SubSquarePartition::new(
                size,
                config.sub_squares_per_side,
                config.edge_width,
            ),
        })
    }

    /// Grid side length in cells
    #[must_use]
    pub fn size(&self) -> usize {
        self.config.size
    }

    #[must_use]
    pub fn config(&self) -> &CompoundCloudConfig {
        &self.config
    }

    #[must_use]
    pub fn window(&self) -> &ToroidalWindow {
        &self.window
    }

    /// Compound bound to each channel slot
    #[must_use]
    pub fn compounds(&self) -> &[Option<CompoundId>; CHANNEL_COUNT] {
        &self.compounds
    }

    /// Channel holding `compound`, or `None` when this grid doesn't simulate it
    #[must_use]
    pub fn channel_of(&self, compound: CompoundId) -> Option<usize> {
        self.compounds.iter().position(|&c| c == Some(compound))
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        match self.compounds.get(channel) {
            Some(Some(_)) => Ok(()),
            _ => Err(CompoundGridError::InvalidChannel { channel }),
        }
    }

    fn check_cell(&self, x: usize, y: usize) -> Result<()> {
        let size = self.size();
        if x < size && y < size {
            Ok(())
        } else {
            Err(CompoundGridError::CoordinateOutOfRange { x, y, size })
        }
    }

    // ---------------------------------------------------------------------
    // Window management
    // ---------------------------------------------------------------------

    /// Move the anchor to a neighbouring sub-square (at most one step per axis)
    /// and zero the storage that now represents newly entered territory.
    ///
    /// The anchor's storage sub-index is `new_anchor mod S` on each axis.
    ///
    /// # Errors
    ///
    /// `UnsupportedJump` if an axis moves more than one sub-square. The grid is
    /// left untouched in that case.
    pub fn reposition(&mut self, new_anchor: SquareCoord) -> Result<()> {
        let stale = self.window.reposition(new_anchor)?;
        for region in stale {
            trace!(?new_anchor, ?region, "zeroing scrolled-in sub-squares");
            self.density.clear_region(region);
            self.previous_density.clear_region(region);
        }
        Ok(())
    }

    /// Place the anchor anywhere, discarding all density.
    ///
    /// Used when the tracked entity jumps farther than the window is wide.
    pub fn reset_anchor(&mut self, anchor: SquareCoord) {
        self.window.reset_anchor(anchor);
        self.clear();
    }

    // ---------------------------------------------------------------------
    // Solver passes
    // ---------------------------------------------------------------------

    fn diffusion_params(&self, dt: f32) -> DiffusionParams {
        let (params, clamped) = DiffusionParams::from_rate(dt, self.config.diffusion_rate);
        if clamped {
            warn!(
                "Diffusion coefficient dt*rate={:.3} clamped to {:.3}",
                dt * self.config.diffusion_rate,
                params.coefficient
            );
        }
        params
    }

    /// Diffuse the frame of width `edge_width` along every sub-square boundary,
    /// serially on the calling thread.
    pub fn step_diffusion_edges(&self, dt: f32) {
        let params = self.diffusion_params(dt);
        for &square in self.partition.squares() {
            for strip in self.partition.edge_strips(square) {
                diffuse_region(&self.density, &self.previous_density, strip, params);
            }
        }
    }

    /// Diffuse every sub-square interior, one task per sub-square.
    ///
    /// Tasks read only `density` and write disjoint regions of
    /// `previous_density`.
    pub fn step_diffusion_interior_parallel(&self, dt: f32, runner: &dyn TaskRunner) {
        let params = self.diffusion_params(dt);
        let source = &self.density;
        let target = &self.previous_density;
        let tasks: Vec<Task<'_>> = self
            .partition
            .squares()
            .iter()
            .filter_map(|&square| self.partition.interior(square))
            .map(|region| {
                Box::new(move || diffuse_region(source, target, region, params)) as Task<'_>
            })
            .collect();
        runner.run_all(tasks);
    }

    /// Advect the diffused field back into `density`.
    ///
    /// Runs two batches separated by the runner's barrier: every task clears
    /// its sub-square of `density`, then every task splats its sub-square of
    /// `previous_density` along the current. Splats that cross into another
    /// sub-square are safe because all accumulation is atomic.
    ///
    /// Point mutations that land in `density` between the start of diffusion
    /// and the clear batch are overwritten by this tick's result: an `add` in
    /// that gap is lost, and a `take` in that gap is undone because diffusion
    /// already copied the old value into `previous_density`.
    pub fn step_advection_parallel(
        &self,
        dt: f32,
        runner: &dyn TaskRunner,
        velocity: &dyn VelocityField,
    ) {
        let density = &self.density;
        let clears: Vec<Task<'_>> = self
            .partition
            .squares()
            .iter()
            .map(|&square| Box::new(move || density.clear_region(square)) as Task<'_>)
            .collect();
        runner.run_all(clears);

        let params = AdvectionParams {
            dt,
            viscosity: self.config.viscosity,
            velocity_threshold: self.config.velocity_threshold,
            min_density: self.config.advection_min_density,
            decay: self.decay_rates,
        };
        let params = &params;
        let source = &self.previous_density;
        let window = &self.window;
        let splats: Vec<Task<'_>> = self
            .partition
            .squares()
            .iter()
            .map(|&square| {
                Box::new(move || advect_region(source, density, square, window, velocity, params))
                    as Task<'_>
            })
            .collect();
        runner.run_all(splats);
    }

    /// Full tick: edge diffusion, interior diffusion, advection
    pub fn step(&self, dt: f32, runner: &dyn TaskRunner, velocity: &dyn VelocityField) {
        self.step_diffusion_edges(dt);
        self.step_diffusion_interior_parallel(dt, runner);
        self.step_advection_parallel(dt, runner, velocity);
    }

    // ---------------------------------------------------------------------
    // Point mutation
    // ---------------------------------------------------------------------

    /// Atomically add `amount` to one channel of a cell.
    ///
    /// Safe from any number of threads, concurrently with the solver. The
    /// stored value never drops below zero.
    ///
    /// # Errors
    ///
    /// `InvalidChannel`, `CoordinateOutOfRange`, or `InvalidArgument` for a
    /// non-finite amount.
    pub fn add(&self, channel: usize, x: usize, y: usize, amount: f32) -> Result<()> {
        self.check_channel(channel)?;
        self.check_cell(x, y)?;
        if !amount.is_finite() {
            return Err(CompoundGridError::invalid_argument(format!(
                "added amount must be finite, got {amount}"
            )));
        }
        self.density
            .slot(x, y, channel)
            .update(|current| (current + amount).max(0.0));
        Ok(())
    }

    /// Single attempt to take `fraction` of `expected_current` from a cell.
    ///
    /// When the remainder would fall below `take_epsilon` the whole amount is
    /// taken. Returns `(taken, true)` if the cell still held exactly
    /// `expected_current`, otherwise `(0.0, false)` and nothing changes; the
    /// caller should re-read and retry.
    ///
    /// # Errors
    ///
    /// `InvalidChannel`, `CoordinateOutOfRange`, or `InvalidArgument` for a
    /// negative fraction.
    pub fn take(
        &self,
        channel: usize,
        x: usize,
        y: usize,
        fraction: f32,
        expected_current: f32,
    ) -> Result<(f32, bool)> {
        self.check_channel(channel)?;
        self.check_cell(x, y)?;
        if fraction.is_nan() || fraction < 0.0 {
            return Err(CompoundGridError::invalid_argument(format!(
                "take fraction must be non-negative, got {fraction}"
            )));
        }

        let mut taken = (expected_current * fraction).min(expected_current);
        if expected_current - taken < self.config.take_epsilon {
            taken = expected_current;
        }
        let remaining = (expected_current - taken).max(0.0);

        match self
            .density
            .slot(x, y, channel)
            .compare_exchange(expected_current, remaining)
        {
            Ok(_) => Ok((taken, true)),
            Err(_) => Ok((0.0, false)),
        }
    }

    /// Zero both buffers
    pub fn clear(&self) {
        self.density.fill_zero();
        self.previous_density.fill_zero();
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Local cell of a world position, or `None` outside the window
    #[must_use]
    pub fn contains(&self, world: Vec2) -> Option<(usize, usize)> {
        self.window.contains(world)
    }

    /// Local cell of a world position, wrapping positions outside the window
    #[must_use]
    pub fn world_to_local(&self, world: Vec2) -> (usize, usize) {
        self.window.world_to_local(world)
    }

    /// World position of a cell centre
    #[must_use]
    pub fn local_to_world(&self, x: usize, y: usize) -> Vec2 {
        self.window.local_to_world(x, y)
    }

    /// Current value of one channel of a cell
    ///
    /// # Errors
    ///
    /// `InvalidChannel` or `CoordinateOutOfRange`.
    pub fn density(&self, channel: usize, x: usize, y: usize) -> Result<f32> {
        self.check_channel(channel)?;
        self.check_cell(x, y)?;
        Ok(self.density.slot(x, y, channel).load(Ordering::Acquire))
    }

    /// `fraction` of what a cell currently holds in one channel
    ///
    /// # Errors
    ///
    /// `InvalidChannel` or `CoordinateOutOfRange`.
    pub fn amount_available(&self, channel: usize, x: usize, y: usize, fraction: f32) -> Result<f32> {
        Ok(self.density(channel, x, y)? * fraction)
    }

    /// Snapshot of all four channels of a cell
    ///
    /// # Errors
    ///
    /// `CoordinateOutOfRange`.
    pub fn density_at(&self, x: usize, y: usize) -> Result<ChannelDensity> {
        self.check_cell(x, y)?;
        Ok(self.density.get(x, y))
    }

    /// Sum of one channel over the grid
    ///
    /// # Errors
    ///
    /// `InvalidChannel`.
    pub fn total_density(&self, channel: usize) -> Result<f64> {
        self.check_channel(channel)?;
        Ok(self.density.total(channel))
    }

    /// Closest cell centre within `search_radius` of `world` whose channel
    /// value is at least `min_amount`.
    ///
    /// Cells are scanned row by row in a fixed order and ties keep the first
    /// hit, so identical grid state gives identical answers. Returns `None`
    /// when `world` is outside the window or nothing qualifies.
    ///
    /// # Errors
    ///
    /// `InvalidChannel`, or `InvalidArgument` for a negative radius.
    pub fn nearest_point_with_channel_above(
        &self,
        world: Vec2,
        channel: usize,
        search_radius: f32,
        min_amount: f32,
    ) -> Result<Option<Vec2>> {
        self.check_channel(channel)?;
        if search_radius.is_nan() || search_radius < 0.0 {
            return Err(CompoundGridError::invalid_argument(format!(
                "search radius must be non-negative, got {search_radius}"
            )));
        }
        let Some((cx, cy)) = self.contains(world) else {
            return Ok(None);
        };

        let size = self.size() as i64;
        // At most `size` offsets per axis, so no storage cell is visited twice
        let cells = (search_radius / self.config.resolution).ceil() as i64;
        let ahead = cells.min(size / 2);
        let behind = cells.min((size - 1) / 2);
        let radius_sq = search_radius * search_radius;
        let mut best: Option<(f32, Vec2)> = None;

        for dy in -behind..=ahead {
            for dx in -behind..=ahead {
                let x = (cx as i64 + dx).rem_euclid(size) as usize;
                let y = (cy as i64 + dy).rem_euclid(size) as usize;
                if self.density.slot(x, y, channel).load(Ordering::Acquire) < min_amount {
                    continue;
                }
                let point = self.window.local_to_world(x, y);
                let distance_sq = (point - world).norm_squared();
                if distance_sq > radius_sq {
                    continue;
                }
                let closer = match best {
                    Some((closest, _)) => distance_sq < closest,
                    None => true,
                };
                if closer {
                    best = Some((distance_sq, point));
                }
            }
        }

        Ok(best.map(|(_, point)| point))
    }

    /// Regions of the grid's sub-squares in row-major order
    #[must_use]
    pub fn sub_squares(&self) -> &[CellRegion] {
        self.partition.squares()
    }
}

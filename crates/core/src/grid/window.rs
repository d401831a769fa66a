//! Toroidal sliding window over the unbounded world plane
//!
//! A grid of `size × size` cells is split into an S×S ring buffer of
//! sub-squares. The window always covers S sub-squares per axis around the
//! anchor sub-square (the one holding the tracked entity): `behind` squares
//! before it and `ahead` squares after it. Moving the anchor by one square
//! reuses the storage of the square that just left the window for the one
//! entering it, which must be zeroed first.
//!
//! With this layout a world cell with global index `c` always lives in
//! storage cell `c mod size`, so scrolling never moves data.

use super::fields::CellRegion;
use crate::core_types::Vec2;
use crate::error::{CompoundGridError, Result};

/// Global sub-square coordinate in world space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SquareCoord {
    pub x: i64,
    pub y: i64,
}

impl SquareCoord {
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Addressing state of one grid
#[derive(Debug, Clone)]
pub struct ToroidalWindow {
    size: usize,
    sub_squares_per_side: usize,
    square_size: usize,
    resolution: f32,
    /// Global sub-square the anchor occupies
    anchor: SquareCoord,
    /// World position of the window's minimum corner
    world_anchor_position: Vec2,
}

impl ToroidalWindow {
    /// Window anchored on the sub-square containing the world origin
    ///
    /// `size` must be divisible by `sub_squares_per_side` (checked by the config).
    #[must_use]
    pub fn new(size: usize, sub_squares_per_side: usize, resolution: f32) -> Self {
        let mut window = Self {
            size,
            sub_squares_per_side,
            square_size: size / sub_squares_per_side,
            resolution,
            anchor: SquareCoord::default(),
            world_anchor_position: Vec2::zeros(),
        };
        window.refresh_world_anchor();
        window
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    #[must_use]
    pub fn square_size(&self) -> usize {
        self.square_size
    }

    #[must_use]
    pub fn sub_squares_per_side(&self) -> usize {
        self.sub_squares_per_side
    }

    /// Sub-squares covered ahead of the anchor on each axis
    #[must_use]
    pub fn ahead(&self) -> usize {
        self.sub_squares_per_side / 2
    }

    /// Sub-squares covered behind the anchor on each axis
    #[must_use]
    pub fn behind(&self) -> usize {
        self.sub_squares_per_side - 1 - self.ahead()
    }

    #[must_use]
    pub fn anchor(&self) -> SquareCoord {
        self.anchor
    }

    /// Storage index `(sx, sy)` of the anchor sub-square
    #[must_use]
    pub fn anchor_subindex(&self) -> (usize, usize) {
        let s = self.sub_squares_per_side as i64;
        (
            self.anchor.x.rem_euclid(s) as usize,
            self.anchor.y.rem_euclid(s) as usize,
        )
    }

    #[must_use]
    pub fn world_anchor_position(&self) -> Vec2 {
        self.world_anchor_position
    }

    /// World extent of one sub-square
    #[must_use]
    pub fn square_world_size(&self) -> f32 {
        self.square_size as f32 * self.resolution
    }

    /// Global sub-square containing a world position
    #[must_use]
    pub fn square_of(&self, world: Vec2) -> SquareCoord {
        let side = self.square_world_size();
        SquareCoord::new(
            (world.x / side).floor() as i64,
            (world.y / side).floor() as i64,
        )
    }

    fn refresh_world_anchor(&mut self) {
        let side = self.square_world_size();
        let behind = self.behind() as i64;
        self.world_anchor_position = Vec2::new(
            (self.anchor.x - behind) as f32 * side,
            (self.anchor.y - behind) as f32 * side,
        );
    }

    /// Offset in cells between window order and storage order on each axis
    fn storage_shift(&self) -> (i64, i64) {
        let (sx, sy) = self.anchor_subindex();
        let behind = self.behind() as i64;
        let square = self.square_size as i64;
        ((sx as i64 - behind) * square, (sy as i64 - behind) * square)
    }

    /// Cell offset of a world position from the window corner (unbounded)
    fn window_offset(&self, world: Vec2) -> (i64, i64) {
        let relative = (world - self.world_anchor_position) / self.resolution;
        (relative.x.floor() as i64, relative.y.floor() as i64)
    }

    /// Storage cell for a world position, wrapping positions outside the window
    #[must_use]
    pub fn world_to_local(&self, world: Vec2) -> (usize, usize) {
        let (ox, oy) = self.window_offset(world);
        let (shift_x, shift_y) = self.storage_shift();
        let size = self.size as i64;
        (
            (ox + shift_x).rem_euclid(size) as usize,
            (oy + shift_y).rem_euclid(size) as usize,
        )
    }

    /// Storage cell for a world position, or `None` when outside the window
    #[must_use]
    pub fn contains(&self, world: Vec2) -> Option<(usize, usize)> {
        let (ox, oy) = self.window_offset(world);
        let size = self.size as i64;
        if (0..size).contains(&ox) && (0..size).contains(&oy) {
            Some(self.world_to_local(world))
        } else {
            None
        }
    }

    /// World position of the centre of a storage cell
    #[must_use]
    pub fn local_to_world(&self, x: usize, y: usize) -> Vec2 {
        let (shift_x, shift_y) = self.storage_shift();
        let size = self.size as i64;
        // Wrapped sub-squares fold back to the correct side of the anchor
        let ox = (x as i64 - shift_x).rem_euclid(size);
        let oy = (y as i64 - shift_y).rem_euclid(size);
        self.world_anchor_position
            + Vec2::new(ox as f32 + 0.5, oy as f32 + 0.5) * self.resolution
    }

    /// Move the anchor by at most one sub-square per axis.
    ///
    /// Returns the storage regions that now represent newly entered territory
    /// and must be zeroed before the solver runs again.
    ///
    /// # Errors
    ///
    /// `UnsupportedJump` if either axis moves by more than one sub-square.
    pub fn reposition(&mut self, new_anchor: SquareCoord) -> Result<Vec<CellRegion>> {
        let dx = new_anchor.x - self.anchor.x;
        let dy = new_anchor.y - self.anchor.y;
        if dx.abs() > 1 || dy.abs() > 1 {
            return Err(CompoundGridError::UnsupportedJump { dx, dy });
        }

        self.anchor = new_anchor;
        self.refresh_world_anchor();

        let (sx, sy) = self.anchor_subindex();
        let mut stale = Vec::with_capacity(2);
        if let Some(column) = self.entering_square(sx, dx) {
            stale.push(CellRegion::new(
                column * self.square_size,
                0,
                self.square_size,
                self.size,
            ));
        }
        if let Some(row) = self.entering_square(sy, dy) {
            stale.push(CellRegion::new(
                0,
                row * self.square_size,
                self.size,
                self.square_size,
            ));
        }
        Ok(stale)
    }

    /// Storage index of the sub-square that entered the window on one axis
    fn entering_square(&self, new_subindex: usize, delta: i64) -> Option<usize> {
        let s = self.sub_squares_per_side;
        match delta {
            1 => Some((new_subindex + self.ahead()) % s),
            -1 => Some((new_subindex + s - self.behind()) % s),
            _ => None,
        }
    }

    /// Place the anchor anywhere without computing stale regions.
    ///
    /// Callers must treat the whole grid as stale.
    pub fn reset_anchor(&mut self, anchor: SquareCoord) {
        self.anchor = anchor;
        self.refresh_world_anchor();
    }
}

//! Atomic density storage
//!
//! Stores a square 2D field of [`CHANNEL_COUNT`] channels per cell as a flat
//! boxed slice in row-major order. The four channels of a cell are contiguous.
//! Every slot is an [`AtomicF32`], so the field can be written through a
//! shared reference from solver tasks and from external callers at once.

use crate::core_types::{AtomicF32, ChannelDensity, CHANNEL_COUNT};
use std::sync::atomic::Ordering;

/// Four atomic channel slots of one cell
#[derive(Debug, Default)]
pub struct CellSlots(pub [AtomicF32; CHANNEL_COUNT]);

/// Axis-aligned block of cells `[x0, x0 + width) × [y0, y0 + height)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRegion {
    pub x0: usize,
    pub y0: usize,
    pub width: usize,
    pub height: usize,
}

impl CellRegion {
    #[must_use]
    pub const fn new(x0: usize, y0: usize, width: usize, height: usize) -> Self {
        Self {
            x0,
            y0,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.width * self.height
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Iterate cells row by row
    pub fn cells(self) -> impl Iterator<Item = (usize, usize)> {
        (self.y0..self.y0 + self.height)
            .flat_map(move |y| (self.x0..self.x0 + self.width).map(move |x| (x, y)))
    }
}

/// Square multi-channel density field
#[derive(Debug)]
pub struct DensityField {
    /// Cell records in row-major order (y * size + x)
    cells: Box<[CellSlots]>,
    /// Side length in cells
    size: usize,
}

impl DensityField {
    /// Create a new field of `size × size` cells, initialized to zero
    #[must_use]
    pub fn new(size: usize) -> Self {
        let cells = (0..size * size).map(|_| CellSlots::default()).collect();
        Self { cells, size }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn cell(&self, x: usize, y: usize) -> &CellSlots {
        assert!(
            x < self.size && y < self.size,
            "Coordinates out of bounds"
        );
        &self.cells[y * self.size + x]
    }

    /// Atomic slot of one channel
    ///
    /// # Panics
    ///
    /// Panics if coordinates or channel are out of bounds
    #[inline]
    pub fn slot(&self, x: usize, y: usize, channel: usize) -> &AtomicF32 {
        &self.cell(x, y).0[channel]
    }

    /// Read all channels of a cell
    ///
    /// Solver passes are ordered by fork-join barriers, so relaxed loads suffice.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> ChannelDensity {
        let cell = self.cell(x, y);
        ChannelDensity(std::array::from_fn(|c| cell.0[c].load(Ordering::Relaxed)))
    }

    /// Overwrite all channels of a cell
    #[inline]
    pub fn set(&self, x: usize, y: usize, value: ChannelDensity) {
        let cell = self.cell(x, y);
        for (slot, v) in cell.0.iter().zip(value.0) {
            slot.store(v, Ordering::Relaxed);
        }
    }

    /// Atomically accumulate into every non-zero channel of a cell
    #[inline]
    pub fn accumulate(&self, x: usize, y: usize, value: ChannelDensity) {
        let cell = self.cell(x, y);
        for (slot, v) in cell.0.iter().zip(value.0) {
            if v != 0.0 {
                slot.fetch_add(v);
            }
        }
    }

    /// Zero every channel inside `region`
    pub fn clear_region(&self, region: CellRegion) {
        for (x, y) in region.cells() {
            self.set(x, y, ChannelDensity::ZERO);
        }
    }

    /// Zero the whole field
    pub fn fill_zero(&self) {
        for cell in &*self.cells {
            for slot in &cell.0 {
                slot.store(0.0, Ordering::Relaxed);
            }
        }
    }

    /// Sum of one channel over the whole field, accumulated in `f64`
    #[must_use]
    pub fn total(&self, channel: usize) -> f64 {
        self.cells
            .iter()
            .map(|cell| f64::from(cell.0[channel].load(Ordering::Acquire)))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_creation() {
        let field = DensityField::new(10);
        assert_eq!(field.size(), 10);
        assert_eq!(field.cells.len(), 100);
        assert!(field.get(9, 9).is_zero());
    }

    #[test]
    fn test_field_get_set() {
        let field = DensityField::new(10);
        field.set(3, 4, ChannelDensity([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(field.get(3, 4), ChannelDensity([1.0, 2.0, 3.0, 4.0]));

        // Verify row-major indexing
        let index = 4 * 10 + 3;
        assert_eq!(field.cells[index].0[2].load(Ordering::Relaxed), 3.0);
    }

    #[test]
    fn test_accumulate_and_totals() {
        let field = DensityField::new(4);
        field.accumulate(0, 0, ChannelDensity([1.0, 0.0, 0.5, 0.0]));
        field.accumulate(0, 0, ChannelDensity([1.0, 0.0, 0.5, 0.0]));
        field.accumulate(3, 2, ChannelDensity([0.25, 0.0, 0.0, 0.0]));
        assert_eq!(field.get(0, 0), ChannelDensity([2.0, 0.0, 1.0, 0.0]));
        assert!((field.total(0) - 2.25).abs() < 1e-9);
        assert!((field.total(2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear_region_only_touches_region() {
        let field = DensityField::new(6);
        for y in 0..6 {
            for x in 0..6 {
                field.set(x, y, ChannelDensity::splat(1.0));
            }
        }
        let region = CellRegion::new(2, 0, 2, 6);
        field.clear_region(region);
        for y in 0..6 {
            for x in 0..6 {
                let expected = if (2..4).contains(&x) { 0.0 } else { 1.0 };
                assert_eq!(field.get(x, y)[0], expected, "cell ({x}, {y})");
            }
        }
        assert_eq!(region.cell_count(), 12);

        field.fill_zero();
        assert_eq!(field.total(3), 0.0);
    }

    #[test]
    fn test_region_iterates_row_major() {
        let cells: Vec<_> = CellRegion::new(1, 1, 2, 2).cells().collect();
        assert_eq!(cells, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
        assert!(CellRegion::new(0, 0, 0, 3).is_empty());
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_field_bounds_check() {
        let field = DensityField::new(10);
        let _ = field.get(10, 5); // Out of bounds
    }
}

//! Sub-square partitioning of a grid for parallel passes
//!
//! Each sub-square is split into a thin edge frame, diffused serially, and an
//! interior block that gets its own parallel task.

use crate::grid::CellRegion;

/// Fixed S×S tiling of a square grid
#[derive(Debug, Clone)]
pub struct SubSquarePartition {
    squares: Vec<CellRegion>,
    edge_width: usize,
}

impl SubSquarePartition {
    /// Tile a `size × size` grid into `per_side²` squares.
    ///
    /// The edge width is clamped to half a square so frames never overlap.
    #[must_use]
    pub fn new(size: usize, per_side: usize, edge_width: usize) -> Self {
        let square = size / per_side;
        let squares = (0..per_side)
            .flat_map(|j| (0..per_side).map(move |i| (i, j)))
            .map(|(i, j)| CellRegion::new(i * square, j * square, square, square))
            .collect();
        Self {
            squares,
            edge_width: edge_width.min(square / 2),
        }
    }

    /// Sub-squares in row-major order
    #[must_use]
    pub fn squares(&self) -> &[CellRegion] {
        &self.squares
    }

    #[must_use]
    pub fn edge_width(&self) -> usize {
        self.edge_width
    }

    /// Disjoint strips forming the edge frame of `square`
    #[must_use]
    pub fn edge_strips(&self, square: CellRegion) -> [CellRegion; 4] {
        let e = self.edge_width;
        let inner = square.height - 2 * e;
        [
            // top and bottom span the full width
            CellRegion::new(square.x0, square.y0, square.width, e),
            CellRegion::new(square.x0, square.y0 + square.height - e, square.width, e),
            // left and right fill the rows in between
            CellRegion::new(square.x0, square.y0 + e, e, inner),
            CellRegion::new(square.x0 + square.width - e, square.y0 + e, e, inner),
        ]
    }

    /// Interior of `square` inside the edge frame, if any cells remain
    #[must_use]
    pub fn interior(&self, square: CellRegion) -> Option<CellRegion> {
        let e = self.edge_width;
        let region = CellRegion::new(
            square.x0 + e,
            square.y0 + e,
            square.width - 2 * e,
            square.height - 2 * e,
        );
        (!region.is_empty()).then_some(region)
    }
}

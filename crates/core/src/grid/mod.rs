//! Toroidal compound grids and their storage

pub mod absorb;
pub mod compound_grid;
pub mod fields;
pub mod window;

// Re-export main types
pub use absorb::{CompoundBag, CompoundStorage};
pub use compound_grid::CompoundGrid;
pub use fields::{CellRegion, CellSlots, DensityField};
pub use window::{SquareCoord, ToroidalWindow};

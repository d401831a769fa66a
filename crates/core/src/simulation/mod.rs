//! Multi-grid compound cloud simulation
//!
//! The manager groups compounds four to a grid, steps every grid each tick
//! and keeps all grids anchored on the same sub-square.

pub mod cloud_manager;

pub use cloud_manager::{CompoundCloudManager, TickStats};

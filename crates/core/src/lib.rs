//! Compound Cloud Simulation Core Library
//!
//! Simulates dissolved compounds drifting through an unbounded 2D world with
//! a fixed amount of memory. Each grid is a toroidal window that scrolls with
//! the tracked entity and carries up to four compound channels per cell.
//!
//! ## Simulation
//!
//! - Diffusion with wraparound neighbours, split into a serial edge pass and
//!   parallel per-sub-square interior passes
//! - Forward advection along an external velocity field with bilinear splats
//! - Lock-free `add`/`take`/absorb from any number of threads, concurrently
//!   with the solver
//! - A manager routing compounds to grids and following an anchor position
//!
//! ```
//! use compound_cloud_core::{
//!     CompoundCloudConfig, CompoundCloudManager, CompoundId, CompoundSpec, RayonTaskRunner,
//!     StillWater, Vec2,
//! };
//!
//! let config = CompoundCloudConfig::default();
//! let sugar = CompoundId(1);
//! let manager = CompoundCloudManager::new(&config, &[CompoundSpec::persistent(sugar)]).unwrap();
//!
//! manager.add_compound(sugar, Vec2::new(3.0, 4.0), 10.0).unwrap();
//! manager.tick(0.5, &RayonTaskRunner::global(), &StillWater);
//! assert!((manager.total_compound(sugar).unwrap() - 10.0).abs() < 1e-3);
//! ```

// Core types and utilities
pub mod config;
pub mod core_types;
pub mod error;

// Grids, solver passes and the multi-grid manager
pub mod grid;
pub mod simulation;
pub mod solver;

// Re-export core types
pub use config::{CompoundCloudConfig, CompoundSpec};
pub use core_types::{AtomicF32, ChannelDensity, CompoundId, Vec2, CHANNEL_COUNT};
pub use error::{CompoundGridError, Result};

// Re-export grid and simulation types
pub use grid::{
    CellRegion, CompoundBag, CompoundGrid, CompoundStorage, DensityField, SquareCoord,
    ToroidalWindow,
};
pub use simulation::{CompoundCloudManager, TickStats};
pub use solver::{
    RayonTaskRunner, SerialTaskRunner, StillWater, Task, TaskRunner, UniformCurrent,
    VelocityField,
};

//! Diffusion/advection solver for compound clouds
//!
//! The solver works on pairs of [`DensityField`](crate::grid::DensityField)s
//! (ping-pong buffers) and is split into passes that the grid schedules:
//!
//! 1. serial diffusion of the thin frame along every sub-square edge,
//! 2. parallel diffusion of each sub-square interior,
//! 3. parallel clear of the density buffer, then parallel advection back
//!    into it with atomic accumulation.
//!
//! Parallel passes are handed to a [`TaskRunner`]; its return is the barrier
//! between passes. Currents come from an external [`VelocityField`].

pub mod advection;
pub mod diffusion;
pub mod partition;
pub mod profiler;
pub mod runner;
pub mod velocity;

// Re-exports
pub use advection::{advect_region, AdvectionParams};
pub use diffusion::{diffuse_region, DiffusionParams};
pub use partition::SubSquarePartition;
pub use profiler::ProfilerScope;
pub use runner::{RayonTaskRunner, SerialTaskRunner, Task, TaskRunner};
pub use velocity::{StillWater, UniformCurrent, VelocityField};

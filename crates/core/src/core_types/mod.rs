//! Core types and utilities

pub mod atomic;
pub mod channel;
pub mod vec2;

// Re-export
pub use atomic::AtomicF32;
pub use channel::{ChannelDensity, CompoundId, CHANNEL_COUNT};
pub use vec2::Vec2;

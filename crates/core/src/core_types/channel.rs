//! Per-cell channel record and compound identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut};

/// Number of independent density channels stored per grid cell
pub const CHANNEL_COUNT: usize = 4;

/// Opaque compound type identifier supplied by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompoundId(pub u16);

impl fmt::Display for CompoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compound#{}", self.0)
    }
}

/// Snapshot of the four channel values of one cell.
///
/// This is a record of independent slots, not a vector: every operation
/// acts on each channel separately and never mixes channels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelDensity(pub [f32; CHANNEL_COUNT]);

impl ChannelDensity {
    /// All channels empty
    pub const ZERO: Self = Self([0.0; CHANNEL_COUNT]);

    /// Same value in every channel
    #[must_use]
    pub const fn splat(value: f32) -> Self {
        Self([value; CHANNEL_COUNT])
    }

    /// Every channel multiplied by the same factor
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self(self.0.map(|v| v * factor))
    }

    /// Channel-wise product, used to apply per-channel decay
    #[must_use]
    pub fn scaled_per_channel(self, factors: &Self) -> Self {
        let mut out = self;
        for (value, factor) in out.0.iter_mut().zip(factors.0) {
            *value *= factor;
        }
        out
    }

    /// Largest single channel value
    #[must_use]
    pub fn max_channel(&self) -> f32 {
        self.0.iter().copied().fold(f32::MIN, f32::max)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

impl Add for ChannelDensity {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for ChannelDensity {
    fn add_assign(&mut self, rhs: Self) {
        for (value, other) in self.0.iter_mut().zip(rhs.0) {
            *value += other;
        }
    }
}

impl Index<usize> for ChannelDensity {
    type Output = f32;

    fn index(&self, channel: usize) -> &f32 {
        &self.0[channel]
    }
}

impl IndexMut<usize> for ChannelDensity {
    fn index_mut(&mut self, channel: usize) -> &mut f32 {
        &mut self.0[channel]
    }
}

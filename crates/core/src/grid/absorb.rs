//! Compound absorption by organisms
//!
//! An absorber drains a cell into its own storage. Each bound channel goes
//! through the same read/estimate/take cycle: read what the cell holds, scale
//! the fraction down if the absorber can't fit it, then attempt a single
//! compare-and-swap take. A failed swap means another caller touched the cell
//! in between, so the cycle starts over from a fresh read.

use super::compound_grid::CompoundGrid;
use crate::core_types::{ChannelDensity, CompoundId, CHANNEL_COUNT};
use crate::error::{CompoundGridError, Result};
use rustc_hash::{FxBuildHasher, FxHashMap};

/// Compound storage of an absorbing organism
pub trait CompoundStorage {
    /// Amount of `compound` that still fits
    fn free_space(&self, compound: CompoundId) -> f32;

    /// Store up to `amount` of `compound`, returning what was actually stored
    fn deposit(&mut self, compound: CompoundId, amount: f32) -> f32;
}

/// Per-compound storage with one shared capacity
#[derive(Debug, Clone, Default)]
pub struct CompoundBag {
    capacity: f32,
    amounts: FxHashMap<CompoundId, f32>,
}

impl CompoundBag {
    /// Bag holding at most `capacity` of each compound
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a negative or non-finite capacity.
    pub fn new(capacity: f32) -> Result<Self> {
        if !(capacity.is_finite() && capacity >= 0.0) {
            return Err(CompoundGridError::invalid_argument(format!(
                "storage capacity must be finite and non-negative, got {capacity}"
            )));
        }
        Ok(Self {
            capacity,
            amounts: FxHashMap::with_capacity_and_hasher(CHANNEL_COUNT, FxBuildHasher),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> f32 {
        self.capacity
    }

    /// Stored amount of `compound`
    #[must_use]
    pub fn amount(&self, compound: CompoundId) -> f32 {
        self.amounts.get(&compound).copied().unwrap_or(0.0)
    }

    /// Remove up to `amount` of `compound`, returning what was removed
    pub fn take(&mut self, compound: CompoundId, amount: f32) -> f32 {
        let Some(stored) = self.amounts.get_mut(&compound) else {
            return 0.0;
        };
        let removed = amount.max(0.0).min(*stored);
        *stored -= removed;
        removed
    }

    /// Stored compounds and amounts, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (CompoundId, f32)> + '_ {
        self.amounts.iter().map(|(&id, &amount)| (id, amount))
    }
}

impl CompoundStorage for CompoundBag {
    fn free_space(&self, compound: CompoundId) -> f32 {
        (self.capacity - self.amount(compound)).max(0.0)
    }

    fn deposit(&mut self, compound: CompoundId, amount: f32) -> f32 {
        let stored = amount.max(0.0).min(self.free_space(compound));
        if stored > 0.0 {
            *self.amounts.entry(compound).or_insert(0.0) += stored;
        }
        stored
    }
}

impl CompoundGrid {
    /// Absorb `fraction` of every bound channel of a cell into `storage`.
    ///
    /// The fraction is reduced per channel when the storage can't hold the
    /// full amount. Amounts reaching the storage are scaled by the configured
    /// `absorption_ratio`. Whatever the storage refuses goes back into the
    /// cell, so the result is what left the grid per channel.
    ///
    /// # Errors
    ///
    /// `CoordinateOutOfRange`, `InvalidArgument` for a negative fraction, or
    /// `InvalidArgument` when the storage reports negative free space.
    pub fn absorb(
        &self,
        x: usize,
        y: usize,
        storage: &mut dyn CompoundStorage,
        fraction: f32,
    ) -> Result<ChannelDensity> {
        if fraction.is_nan() || fraction < 0.0 {
            return Err(CompoundGridError::invalid_argument(format!(
                "absorb fraction must be non-negative, got {fraction}"
            )));
        }
        // Surfaces CoordinateOutOfRange before touching storage
        self.density_at(x, y)?;

        let ratio = self.config().absorption_ratio;
        let mut absorbed = ChannelDensity::ZERO;

        for (channel, compound) in self.compounds().iter().enumerate() {
            let Some(compound) = *compound else {
                continue;
            };

            loop {
                let current = self.density(channel, x, y)?;
                if current <= 0.0 {
                    break;
                }

                let free = storage.free_space(compound);
                if free < 0.0 {
                    return Err(CompoundGridError::invalid_argument(format!(
                        "storage reports negative free space {free} for {compound}"
                    )));
                }

                let mut effective = fraction;
                let generous = current * fraction * ratio;
                if generous > free {
                    effective = free / (current * ratio);
                }
                if effective <= 0.0 {
                    break;
                }

                let (taken, success) = self.take(channel, x, y, effective, current)?;
                if success {
                    let stored = storage.deposit(compound, taken * ratio);
                    // The epsilon drain can overshoot free space; return the excess
                    let mut leftover = 0.0;
                    if ratio > 0.0 {
                        leftover = (taken - stored / ratio).max(0.0);
                        if leftover > 0.0 {
                            self.add(channel, x, y, leftover)?;
                        }
                    }
                    absorbed[channel] = taken - leftover;
                    break;
                }
            }
        }

        Ok(absorbed)
    }
}

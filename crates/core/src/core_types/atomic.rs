//! Atomic `f32` cell built on `AtomicU32` bit patterns.
//!
//! Every density slot of a grid is one of these. Compare-and-swap compares
//! raw bit patterns, so a caller must pass back exactly the value it loaded
//! (which is what the two-phase read/take protocol does).

use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free `f32` slot.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    /// Create a slot holding `value`
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    #[inline]
    pub fn store(&self, value: f32, order: Ordering) {
        self.0.store(value.to_bits(), order);
    }

    /// Single compare-and-swap attempt.
    ///
    /// # Errors
    ///
    /// Returns the value actually stored when it differs from `current`.
    #[inline]
    pub fn compare_exchange(&self, current: f32, new: f32) -> Result<f32, f32> {
        self.0
            .compare_exchange(
                current.to_bits(),
                new.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(f32::from_bits)
            .map_err(f32::from_bits)
    }

    /// Optimistic retry loop: recompute `update` from a freshly read value
    /// until the swap lands. Returns the value replaced.
    #[inline]
    pub fn update<F>(&self, mut update: F) -> f32
    where
        F: FnMut(f32) -> f32,
    {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let next = update(f32::from_bits(current)).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(previous) => return f32::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically add `delta`, returning the previous value
    #[inline]
    pub fn fetch_add(&self, delta: f32) -> f32 {
        self.update(|value| value + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_load_store() {
        let slot = AtomicF32::new(1.5);
        assert_eq!(slot.load(Ordering::Relaxed), 1.5);
        slot.store(-3.25, Ordering::Relaxed);
        assert_eq!(slot.load(Ordering::Relaxed), -3.25);
    }

    #[test]
    fn test_compare_exchange_reports_actual_value() {
        let slot = AtomicF32::new(2.0);
        assert_eq!(slot.compare_exchange(2.0, 5.0), Ok(2.0));
        assert_eq!(slot.compare_exchange(2.0, 7.0), Err(5.0));
        assert_eq!(slot.load(Ordering::Relaxed), 5.0);
    }

    #[test]
    fn test_fetch_add_from_many_threads() {
        let slot = AtomicF32::default();
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..250 {
                        slot.fetch_add(1.0);
                    }
                });
            }
        });
        assert_eq!(slot.load(Ordering::Relaxed), 2000.0);
    }
}

//! Timing helpers for solver passes.
//!
//! Provides RAII-style profiling scopes that report through `tracing`.
use std::time::Instant;
use tracing::trace;

/// A profiling scope that measures elapsed time using RAII.
///
/// Elapsed time is logged at trace level when the scope ends.
pub struct ProfilerScope {
    start: Instant,
    name: &'static str,
}

impl ProfilerScope {
    /// Creates a new profiling scope.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Gets elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Ends the scope and returns its duration in milliseconds.
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        trace!(pass = self.name, elapsed_ms = self.elapsed_ms(), "solver pass finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_profiler_scope_measures_time() {
        let scope = ProfilerScope::new("test");
        thread::sleep(Duration::from_millis(10));
        let elapsed = scope.elapsed_ms();
        assert!(elapsed >= 10.0, "Expected at least 10ms, got {elapsed}");
        let finished = scope.finish();
        assert!(finished >= elapsed);
    }
}

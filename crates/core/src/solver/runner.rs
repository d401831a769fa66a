//! Fork-join execution of solver tasks
//!
//! The grid hands a batch of independent closures to a [`TaskRunner`] and
//! expects every task to have finished when `run_all` returns. That return is
//! the barrier between solver passes.

use crate::error::{CompoundGridError, Result};
use std::sync::Arc;

/// One unit of solver work, borrowing the grid for the duration of the batch
pub type Task<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Blocking fork-join executor
pub trait TaskRunner: Send + Sync {
    /// Run every task and return once all of them have completed
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>);
}

/// Runs tasks on rayon, either the global pool or a dedicated one
#[derive(Debug, Clone, Default)]
pub struct RayonTaskRunner {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RayonTaskRunner {
    /// Use rayon's global thread pool
    #[must_use]
    pub fn global() -> Self {
        Self::default()
    }

    /// Build a dedicated pool with `threads` workers
    ///
    /// # Errors
    ///
    /// Returns `ThreadPool` if the pool cannot be created.
    pub fn with_threads(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("compound-solver-{index}"))
            .build()
            .map_err(|e| CompoundGridError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool: Some(Arc::new(pool)),
        })
    }

    /// Worker count of the pool tasks run on
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }
}

impl TaskRunner for RayonTaskRunner {
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) {
        match &self.pool {
            Some(pool) => pool.scope(|scope| {
                for task in tasks {
                    scope.spawn(move |_| task());
                }
            }),
            None => rayon::scope(|scope| {
                for task in tasks {
                    scope.spawn(move |_| task());
                }
            }),
        }
    }
}

/// Runs tasks one after another on the calling thread, in order
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialTaskRunner;

impl TaskRunner for SerialTaskRunner {
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) {
        for task in tasks {
            task();
        }
    }
}

//! Fan-out of independent grid cells over a worker pool.
//!
//! Every cell gets its own result slot, in input order, so one cell failing
//! never affects the others. The pool size is passed in explicitly rather than
//! configured globally.

use crate::errors::{PvSynthError, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcessingMode {
    /// One cell after another on the calling thread
    Sequential,
    /// Rayon's global pool, one thread per core
    #[default]
    Parallel,
    /// A dedicated pool with the given number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    pub fn from_num_threads(num_threads: Option<usize>) -> Self {
        match num_threads {
            None => ProcessingMode::Parallel,
            Some(1) => ProcessingMode::Sequential,
            Some(threads) => ProcessingMode::ParallelWith(threads),
        }
    }
}

/// Shared flag for aborting a run. Cells not yet started when it is set
/// report `Cancelled`.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `work` for every cell, returning one result per cell in cell order.
///
/// `on_cell_done` is called after each cell finishes, from whichever worker
/// ran it. Fails only if a dedicated thread pool cannot be built.
pub fn dispatch<C, T, F>(
    cells: &[C],
    mode: ProcessingMode,
    cancellation: &CancellationToken,
    on_cell_done: Option<&(dyn Fn() + Sync)>,
    work: F,
) -> Result<Vec<Result<T>>>
where
    C: Sync,
    T: Send,
    F: Fn(&C) -> Result<T> + Sync,
{
    let run_cell = |cell: &C| {
        if cancellation.is_cancelled() {
            return Err(PvSynthError::Cancelled);
        }
        let result = work(cell);
        if let Some(on_cell_done) = on_cell_done {
            on_cell_done();
        }
        result
    };

    debug!("Dispatching {} cells ({mode:?})", cells.len());
    let results: Vec<Result<T>> = match mode {
        ProcessingMode::Sequential => cells.iter().map(run_cell).collect(),
        ProcessingMode::Parallel => cells.par_iter().map(run_cell).collect(),
        ProcessingMode::ParallelWith(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|err| {
                    PvSynthError::InvalidConfiguration(format!(
                        "could not build a pool of {threads} threads: {err}"
                    ))
                })?;
            pool.install(|| cells.par_iter().map(run_cell).collect())
        }
    };

    let failures = results.iter().filter(|result| result.is_err()).count();
    if failures > 0 {
        warn!("{failures} of {} cells failed", results.len());
    }
    Ok(results)
}

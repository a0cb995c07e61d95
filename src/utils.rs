//! Small helpers shared by the engine and the request path.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether batched inference may fan out over the rayon pool.
///
/// The flag is resolved once from `n_threads` when the engine is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if the rayon pool has multiple threads)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Run `f` over every item, bridging into rayon when parallel.
    ///
    /// Works with iterators that don't implement `IntoParallelIterator`,
    /// such as zipped `chunks_mut` / `chunks` pairs.
    #[inline]
    pub fn maybe_par_bridge_for_each<T, I, F>(self, iter: I, f: F)
    where
        T: Send,
        I: Iterator<Item = T> + Send,
        F: Fn(T) + Sync + Send,
    {
        if self.is_parallel() {
            iter.par_bridge().for_each(f);
        } else {
            iter.for_each(f);
        }
    }
}

/// Dedicated pool for an explicit thread count.
///
/// - 0 = none, run on the global rayon pool
/// - 1 = none, sequential
/// - >1 = a pool of exactly `n_threads` workers
pub fn thread_pool(n_threads: usize) -> Result<Option<Arc<ThreadPool>>, ThreadPoolBuildError> {
    if n_threads <= 1 {
        return Ok(None);
    }
    let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
    Ok(Some(Arc::new(pool)))
}

// =============================================================================
// Allocation
// =============================================================================

/// Allocate a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, std::collections::TryReserveError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, T::default());
    Ok(buf)
}

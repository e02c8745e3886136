//! Parallel processing strategies

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use voxmeta_core::{Error, Result};

/// Processing mode for algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for a user-facing thread count: `0` = all cores, `1` = sequential
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => ProcessingMode::Parallel,
            1 => ProcessingMode::Sequential,
            n => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Execute a function over indices in parallel
    fn par_for_each<F>(&self, range: std::ops::Range<usize>, f: F) -> Result<()>
    where
        F: Fn(usize) + Sync + Send;

    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

#[cfg(feature = "parallel")]
fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Other(format!("Failed to build thread pool: {}", e)))
}

impl ParallelStrategy for ProcessingMode {
    fn par_for_each<F>(&self, range: std::ops::Range<usize>, f: F) -> Result<()>
    where
        F: Fn(usize) + Sync + Send,
    {
        match self {
            ProcessingMode::ParallelWith(0) => Err(invalid_threads()),
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => {
                range.into_par_iter().for_each(f);
                Ok(())
            }
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                build_pool(*threads)?.install(|| range.into_par_iter().for_each(f));
                Ok(())
            }
            _ => {
                range.for_each(f);
                Ok(())
            }
        }
    }

    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::ParallelWith(0) => Err(invalid_threads()),
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => Ok(range.into_par_iter().map(f).collect()),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                Ok(build_pool(*threads)?.install(|| range.into_par_iter().map(f).collect()))
            }
            _ => Ok(range.map(f).collect()),
        }
    }
}

fn invalid_threads() -> Error {
    Error::InvalidParameter {
        name: "threads",
        value: "0".into(),
        reason: "a dedicated pool needs at least one thread".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_par_map_preserves_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(2),
        ] {
            let out = mode.par_map(0..100, |i| i * 2).unwrap();
            assert_eq!(out, (0..100).map(|i| i * 2).collect::<Vec<_>>(), "{mode:?}");
        }
    }

    #[test]
    fn test_par_for_each_visits_all() {
        let counter = AtomicUsize::new(0);
        ProcessingMode::Parallel
            .par_for_each(0..1000, |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(ProcessingMode::ParallelWith(0).par_map(0..4, |i| i).is_err());
    }

    #[test]
    fn test_from_threads() {
        assert_eq!(ProcessingMode::from_threads(0), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::from_threads(1), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_threads(8), ProcessingMode::ParallelWith(8));
    }
}

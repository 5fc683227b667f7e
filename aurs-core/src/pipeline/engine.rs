// aurs-core/src/pipeline/engine.rs
use std::sync::Arc;

use aurs_common::error::{AursError, Result};
use aurs_common::model::PackageRef;
use aurs_common::Session;
use crossbeam_channel::unbounded;
use threadpool::ThreadPool;
use tracing::{debug, instrument};

/// Bounded thread pool for independent blocking I/O.
#[derive(Clone)]
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        debug!("Worker pool created with {} workers.", size);
        Self {
            pool: ThreadPool::new(size),
        }
    }

    /// `min(cpus, 8)` workers.
    pub fn with_default_size() -> Self {
        Self::new(num_cpus::get().min(8))
    }

    pub fn size(&self) -> usize {
        self.pool.max_count()
    }

    /// Runs every job on the pool and blocks until all of them report back.
    /// Results come back in submission order; the first failing job (by
    /// submission order) fails the whole batch.
    pub fn run_batch<T, F>(&self, jobs: Vec<F>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let expected = jobs.len();
        let (result_tx, result_rx) = unbounded::<(usize, Result<T>)>();

        for (request_id, job) in jobs.into_iter().enumerate() {
            let result_tx = result_tx.clone();
            self.pool.execute(move || {
                let _ = result_tx.send((request_id, job()));
            });
        }
        drop(result_tx);

        let mut slots: Vec<Option<Result<T>>> = (0..expected).map(|_| None).collect();
        for _ in 0..expected {
            let (request_id, result) = result_rx.recv().map_err(|_| {
                AursError::Generic("a worker exited without reporting a result".to_string())
            })?;
            slots[request_id] = Some(result);
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(AursError::Generic("missing worker result".to_string()))
                })
            })
            .collect()
    }
}

/// Loads the repository and installed-package snapshots concurrently and
/// seeds them into the session.
#[instrument(skip_all, name = "preload_snapshots")]
pub fn preload_snapshots(session: &Session, pool: &WorkerPool) -> Result<()> {
    let repo_db = Arc::clone(session.database());
    let local_db = Arc::clone(session.database());
    let jobs: Vec<Box<dyn FnOnce() -> Result<Vec<PackageRef>> + Send>> = vec![
        Box::new(move || repo_db.repo_packages()),
        Box::new(move || local_db.local_packages()),
    ];
    let mut loaded = pool.run_batch(jobs)?.into_iter();
    let repo = loaded.next().unwrap_or_default();
    let local = loaded.next().unwrap_or_default();
    debug!(
        "Preloaded {} repository and {} installed packages",
        repo.len(),
        local.len()
    );
    session.install_snapshots(repo, local);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_results_keep_submission_order() {
        let pool = WorkerPool::new(4);
        let jobs: Vec<_> = (0..8u64)
            .map(|i| {
                move || {
                    thread::sleep(Duration::from_millis((8 - i) * 3));
                    Ok(i)
                }
            })
            .collect();
        assert_eq!(pool.run_batch(jobs).unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_any_failure_fails_the_batch_after_all_complete() {
        let pool = WorkerPool::new(2);
        let finished = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..5)
            .map(|i| {
                let finished = Arc::clone(&finished);
                move || {
                    finished.fetch_add(1, Ordering::SeqCst);
                    if i == 3 {
                        Err(AursError::HttpError("boom".into()))
                    } else {
                        Ok(i)
                    }
                }
            })
            .collect();
        let err = pool.run_batch(jobs).unwrap_err();
        assert!(matches!(err, AursError::HttpError(_)));
        assert_eq!(finished.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_panicking_job_does_not_hang() {
        let pool = WorkerPool::new(2);
        let jobs: Vec<Box<dyn FnOnce() -> Result<u8> + Send>> = vec![
            Box::new(|| Ok(1)),
            Box::new(|| panic!("worker died")),
        ];
        assert!(pool.run_batch(jobs).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let pool = WorkerPool::with_default_size();
        let jobs: Vec<fn() -> Result<u8>> = Vec::new();
        assert!(pool.run_batch(jobs).unwrap().is_empty());
    }
}

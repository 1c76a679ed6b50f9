use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{error, info};

use accel_common::err::AccelError;

/// Pool-assigned identity for a worker thread, standing in for the PID
/// a forked child process would have carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub u32);

/// A bounded pool of `jobs` concurrent workers, backed by an OS-thread
/// pool rather than a fork-per-table process pool: each `run` call is
/// itself the barrier the restore state machine drains on between
/// stages, since `std::thread::scope` does not return until every
/// spawned worker has exited.
pub struct WorkerPool {
    jobs: usize,
}

impl WorkerPool {
    pub fn new(jobs: usize) -> Self {
        WorkerPool {
            jobs: jobs.max(1),
        }
    }

    /// Runs `work` over every item in `items`, never more than `self.jobs`
    /// concurrently. The first failure stops further dispatch ("no
    /// further work is dispatched; remaining children are reaped") but
    /// still waits for already-running work to finish before returning.
    pub fn run<T, F>(&self, items: &[T], work: F) -> Result<(), AccelError>
    where
        T: Sync,
        F: Fn(WorkerId, &T) -> Result<(), AccelError> + Sync,
    {
        let next = AtomicUsize::new(0);
        let aborted = AtomicBool::new(false);
        let failures: Mutex<Vec<AccelError>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for worker in 0..self.jobs {
                let worker_id = WorkerId(worker as u32);
                let next = &next;
                let aborted = &aborted;
                let failures = &failures;
                let work = &work;

                scope.spawn(move || loop {
                    if aborted.load(Ordering::SeqCst) {
                        break;
                    }
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    if idx >= items.len() {
                        break;
                    }

                    info!(worker = worker_id.0, index = idx, "dispatching work item");
                    if let Err(e) = work(worker_id, &items[idx]) {
                        error!(worker = worker_id.0, "worker failed: {e}");
                        aborted.store(true, Ordering::SeqCst);
                        failures.lock().expect("failures mutex poisoned").push(e);
                        break;
                    }
                });
            }
        });

        let mut failures = failures.into_inner().expect("failures mutex poisoned");
        match failures.pop() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn runs_every_item_when_none_fail() {
        let pool = WorkerPool::new(2);
        let items = vec![1, 2, 3, 4, 5];
        let completed = AtomicU32::new(0);

        let result = pool.run(&items, |_worker, _item| {
            completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(completed.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn stops_dispatching_after_first_failure() {
        let pool = WorkerPool::new(1);
        let items = vec![1, 2, 3];
        let completed = AtomicU32::new(0);

        let result = pool.run(&items, |_worker, item| {
            completed.fetch_add(1, Ordering::SeqCst);
            if *item == 1 {
                Err(AccelError::Schema {
                    detail: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        });

        assert!(result.is_err());
        // single-worker pool processes in order, so nothing past the
        // failing item should have run.
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }
}

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// An opaque unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queue {
    pending: Vec<Job>,
    shutting_down: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// Fixed-size worker pool draining a shared job queue.
///
/// `dispatch` appends under the lock. A worker takes the whole pending list
/// in one swap while holding the lock, then runs the batch outside it. Each
/// job runs at most once; no ordering or completion signal is provided.
/// Dropping the dispatcher lets the workers finish everything queued, then joins them.
pub struct WorkDispatcher {
    name: String,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkDispatcher {
    /// Spawn `workers` threads (at least one).
    pub fn new(name: impl Into<String>, workers: usize) -> std::io::Result<Self> {
        let name = name.into();
        let shared = Arc::new(Shared::default());
        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || worker_loop(&shared))?;
            handles.push(handle);
        }
        tracing::debug!(name = %name, workers = handles.len(), "work dispatcher started");
        Ok(Self {
            name,
            shared,
            workers: handles,
        })
    }

    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        let mut queue = self
            .shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        queue.pending.push(Box::new(job));
        drop(queue);
        self.shared.available.notify_one();
    }

    /// Jobs queued but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkDispatcher {
    fn drop(&mut self) {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shutting_down = true;
        self.shared.available.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!(name = %self.name, "worker thread panicked");
            }
        }
        tracing::debug!(name = %self.name, "work dispatcher stopped");
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let batch = {
            let mut queue = shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
            while queue.pending.is_empty() && !queue.shutting_down {
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if queue.pending.is_empty() {
                return;
            }
            std::mem::take(&mut queue.pending)
        };
        for job in batch {
            job();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn every_job_runs_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkDispatcher::new("test", 4).unwrap();
            for _ in 0..1000 {
                let counter = Arc::clone(&counter);
                pool.dispatch(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn jobs_run_on_worker_threads() {
        let pool = WorkDispatcher::new("named", 1).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.dispatch(move || {
            let name = thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        });
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("named-0"));
    }

    #[test]
    fn zero_workers_still_spawns_one() {
        let pool = WorkDispatcher::new("min", 0).unwrap();
        assert_eq!(pool.worker_count(), 1);
    }

    #[test]
    fn drop_drains_queue() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let done = Arc::new(AtomicUsize::new(0));
        let pool = WorkDispatcher::new("drain", 1).unwrap();
        pool.dispatch(move || {
            let _ = gate_rx.recv_timeout(Duration::from_secs(5));
        });
        for _ in 0..10 {
            let done = Arc::clone(&done);
            pool.dispatch(move || {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        gate_tx.send(()).unwrap();
        drop(pool);
        assert_eq!(done.load(Ordering::SeqCst), 10);
    }
}

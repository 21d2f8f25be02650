use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use deckcore_config::ResolverSettings;
use parking_lot::Mutex;

use crate::cell::Sink;
use crate::CacheError;

/// Synchronous resolution step run on a worker thread.
///
/// Returning `None` means "resolved, nothing found" and is not an error.
pub trait Resolve: Send + Sync + 'static {
    type Key: Send + 'static;
    type Output: Send + Sync + 'static;

    fn resolve(&self, key: &Self::Key) -> Option<Self::Output>;
}

enum Job<K, T> {
    Resolve { key: K, sink: Sink<T> },
    Shutdown,
}

/// Background threads draining one bounded FIFO job queue.
///
/// Each job is resolved by exactly one worker and its sink is fulfilled once.
/// Shutdown enqueues one sentinel per worker behind any queued jobs, so
/// everything submitted before shutdown is still resolved.
pub struct WorkerPool<R: Resolve> {
    name: &'static str,
    sender: Sender<Job<R::Key, R::Output>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<R: Resolve> WorkerPool<R> {
    pub fn new(
        name: &'static str,
        resolver: R,
        settings: ResolverSettings,
    ) -> Result<Self, CacheError> {
        let capacity = settings.queue_capacity.max(1);
        let worker_count = settings.workers.max(1);
        let (sender, receiver) = bounded::<Job<R::Key, R::Output>>(capacity);
        let resolver = Arc::new(resolver);

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let resolver = Arc::clone(&resolver);
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || run_worker(name, resolver, receiver));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    for _ in 0..workers.len() {
                        let _ = sender.send(Job::Shutdown);
                    }
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(CacheError::Spawn(err));
                }
            }
        }

        tracing::info!(pool = name, workers = worker_count, capacity, "worker pool started");

        Ok(Self {
            name,
            sender,
            workers: Mutex::new(workers),
            closed: AtomicBool::new(false),
        })
    }

    /// Enqueues a job, blocking only while the queue is at capacity.
    ///
    /// Submitting after [`shutdown`](Self::shutdown) is a caller bug: it
    /// panics in debug builds and is dropped with a warning otherwise.
    pub fn submit(&self, key: R::Key, sink: Sink<R::Output>) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            debug_assert!(false, "job submitted to {} after shutdown", self.name);
            tracing::warn!(pool = self.name, "ignoring job submitted after shutdown");
            return Err(CacheError::ShutDown);
        }

        self.sender
            .send(Job::Resolve { key, sink })
            .map_err(|_| CacheError::ShutDown)
    }

    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the workers after the queue drains and joins them. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for _ in 0..workers.len() {
            let _ = self.sender.send(Job::Shutdown);
        }
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!(pool = self.name, "worker thread panicked");
            }
        }

        tracing::info!(pool = self.name, "worker pool stopped");
    }
}

impl<R: Resolve> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<R: Resolve>(
    name: &'static str,
    resolver: Arc<R>,
    receiver: Receiver<Job<R::Key, R::Output>>,
) {
    while let Ok(job) = receiver.recv() {
        let (key, sink) = match job {
            Job::Resolve { key, sink } => (key, sink),
            Job::Shutdown => break,
        };

        // No reader holds the sink anymore (e.g. its listing was retargeted).
        if Arc::strong_count(&sink) == 1 {
            tracing::trace!(pool = name, "skipping orphaned job");
            continue;
        }

        let output = resolver.resolve(&key);
        if !sink.fulfill(output) {
            tracing::warn!(pool = name, "sink was already fulfilled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Resolution, ResultCell};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct Doubler {
        calls: Arc<AtomicUsize>,
    }

    impl Resolve for Doubler {
        type Key = u32;
        type Output = u32;

        fn resolve(&self, key: &u32) -> Option<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (*key != 0).then_some(key * 2)
        }
    }

    fn wait_ready<T>(cell: &ResultCell<T>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cell.is_ready() {
            assert!(Instant::now() < deadline, "job never completed");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn resolves_jobs_and_absent_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(
            "test",
            Doubler {
                calls: Arc::clone(&calls),
            },
            ResolverSettings {
                queue_capacity: 8,
                workers: 2,
            },
        )
        .unwrap();

        let found = Arc::new(ResultCell::pending());
        let missing = Arc::new(ResultCell::pending());
        pool.submit(21, Arc::clone(&found)).unwrap();
        pool.submit(0, Arc::clone(&missing)).unwrap();

        wait_ready(&found);
        wait_ready(&missing);
        assert_eq!(found.value(), Some(&42));
        assert!(matches!(missing.state(), Resolution::Absent));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(
            "drain",
            Doubler {
                calls: Arc::clone(&calls),
            },
            ResolverSettings {
                queue_capacity: 64,
                workers: 1,
            },
        )
        .unwrap();

        let cells: Vec<_> = (1..=20).map(|_| Arc::new(ResultCell::pending())).collect();
        for (key, cell) in (1..=20).zip(&cells) {
            pool.submit(key, Arc::clone(cell)).unwrap();
        }
        pool.shutdown();

        assert!(pool.is_shut_down());
        assert!(cells.iter().all(|cell| cell.is_ready()));
        assert_eq!(calls.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn orphaned_jobs_are_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(
            "orphan",
            Doubler {
                calls: Arc::clone(&calls),
            },
            ResolverSettings::default(),
        )
        .unwrap();

        pool.submit(5, Arc::new(ResultCell::pending())).unwrap();
        pool.shutdown();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "after shutdown")]
    fn submit_after_shutdown_is_fatal_in_debug() {
        let pool = WorkerPool::new(
            "closed",
            Doubler {
                calls: Arc::new(AtomicUsize::new(0)),
            },
            ResolverSettings::default(),
        )
        .unwrap();
        pool.shutdown();
        let _ = pool.submit(1, Arc::new(ResultCell::pending()));
    }
}

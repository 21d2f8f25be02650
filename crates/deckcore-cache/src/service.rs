use std::sync::Arc;

use deckcore_config::ResolverSettings;
use parking_lot::Mutex;

use crate::cell::{Resolution, ResultCell, Sink};
use crate::identity::{IdentityMap, ResourceId};
use crate::worker::{Resolve, WorkerPool};
use crate::CacheError;

/// Per-id cell; `None` until the first request. Never cleared once set.
type CacheSlot<T> = Option<Sink<T>>;

struct CacheState<T> {
    identities: IdentityMap,
    slots: Vec<CacheSlot<T>>,
}

/// Name-addressed memoizing resolver.
///
/// Every name is interned to a [`ResourceId`]; the first [`request`](Self::request)
/// for an id enqueues exactly one resolution job and every later request
/// observes the same cell. [`poll`](Self::poll) is the non-blocking read side.
/// Entries are kept for the lifetime of the service.
pub struct ResolverService<R>
where
    R: Resolve<Key = Arc<str>>,
{
    state: Mutex<CacheState<R::Output>>,
    pool: WorkerPool<R>,
}

impl<R> ResolverService<R>
where
    R: Resolve<Key = Arc<str>>,
{
    pub fn new(
        name: &'static str,
        resolver: R,
        settings: ResolverSettings,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            state: Mutex::new(CacheState {
                identities: IdentityMap::new(),
                slots: Vec::new(),
            }),
            pool: WorkerPool::new(name, resolver, settings)?,
        })
    }

    pub fn intern(&self, name: &str) -> Result<ResourceId, CacheError> {
        let mut state = self.state.lock();
        let (id, fresh) = state.identities.intern(name)?;
        if fresh {
            state.slots.push(None);
        }
        Ok(id)
    }

    pub fn name(&self, id: ResourceId) -> Option<Arc<str>> {
        self.state.lock().identities.name(id).cloned()
    }

    /// Returns the cell tracking `id`, enqueueing a resolution job the first time.
    pub fn request(&self, id: ResourceId) -> Result<Sink<R::Output>, CacheError> {
        let (name, cell) = {
            let mut state = self.state.lock();
            let name = state
                .identities
                .name(id)
                .cloned()
                .ok_or(CacheError::UnknownId(id))?;
            let slot = state
                .slots
                .get_mut(id.index())
                .ok_or(CacheError::UnknownId(id))?;
            if let Some(cell) = slot {
                return Ok(Arc::clone(cell));
            }

            let cell = Arc::new(ResultCell::pending());
            *slot = Some(Arc::clone(&cell));
            (name, cell)
        };

        // The slot already owns the cell, so racing requesters return above
        // and the job is enqueued once even though the lock is released here.
        tracing::debug!(%id, name = %name, "enqueue resolution");
        if let Err(err) = self.pool.submit(name, Arc::clone(&cell)) {
            tracing::warn!(%id, error = %err, "resolution request dropped");
        }
        Ok(cell)
    }

    pub fn request_name(&self, name: &str) -> Result<Sink<R::Output>, CacheError> {
        self.request(self.intern(name)?)
    }

    /// Non-blocking read of a previously requested id.
    pub fn poll(&self, id: ResourceId) -> Result<Resolution<R::Output>, CacheError> {
        let state = self.state.lock();
        let slot = state
            .slots
            .get(id.index())
            .ok_or(CacheError::UnknownId(id))?;
        match slot {
            Some(cell) => Ok(cell.state()),
            None => Err(CacheError::NotRequested(id)),
        }
    }

    /// Requests `id` if needed and reports its current state without waiting.
    pub fn fetch(&self, id: ResourceId) -> Result<Resolution<R::Output>, CacheError> {
        Ok(self.request(id)?.state())
    }

    pub fn fetch_name(&self, name: &str) -> Resolution<R::Output> {
        self.intern(name)
            .and_then(|id| self.fetch(id))
            .unwrap_or(Resolution::Pending)
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_jobs(&self) -> usize {
        self.pool.queued()
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    struct CountingResolver {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl Resolve for CountingResolver {
        type Key = Arc<str>;
        type Output = String;

        fn resolve(&self, key: &Arc<str>) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            (key.as_ref() != "missing").then(|| format!("bitmap:{key}"))
        }
    }

    fn service(delay: Duration) -> (ResolverService<CountingResolver>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = ResolverService::new(
            "icons-test",
            CountingResolver {
                calls: Arc::clone(&calls),
                delay,
            },
            ResolverSettings {
                queue_capacity: 16,
                workers: 2,
            },
        )
        .unwrap();
        (service, calls)
    }

    fn wait_resolved(
        service: &ResolverService<CountingResolver>,
        id: ResourceId,
    ) -> Resolution<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let state = service.poll(id).unwrap();
            if !state.is_pending() {
                return state;
            }
            assert!(Instant::now() < deadline, "resolution never finished");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn concurrent_requests_share_one_job() {
        let (service, calls) = service(Duration::from_millis(20));
        let service = Arc::new(service);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    service.request_name("folder").unwrap()
                })
            })
            .collect();
        let cells: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let id = service.intern("folder").unwrap();
        let first = wait_resolved(&service, id).ready().unwrap();
        assert_eq!(first.as_str(), "bitmap:folder");
        for cell in &cells {
            assert!(Arc::ptr_eq(&cell.state().ready().unwrap(), &first));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn poll_does_not_wait_for_slow_resolution() {
        let (service, _) = service(Duration::from_millis(300));
        let id = service.intern("slow").unwrap();
        service.request(id).unwrap();

        let started = Instant::now();
        assert!(service.poll(id).unwrap().is_pending());
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn not_found_resolves_to_absent() {
        let (service, calls) = service(Duration::ZERO);
        let id = service.intern("missing").unwrap();
        service.request(id).unwrap();

        assert!(matches!(wait_resolved(&service, id), Resolution::Absent));
        service.request(id).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn polling_unrequested_ids_is_invalid_usage() {
        let (service, _) = service(Duration::ZERO);
        let id = service.intern("never-requested").unwrap();
        assert!(matches!(service.poll(id), Err(CacheError::NotRequested(_))));

        let mut other = IdentityMap::new();
        other.intern("a").unwrap();
        let (foreign, _) = other.intern("b").unwrap();
        assert!(matches!(service.poll(foreign), Err(CacheError::UnknownId(_))));
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cell::Resolution;
use crate::identity::ResourceId;
use crate::service::ResolverService;
use crate::worker::Resolve;
use crate::CacheError;

/// Turns a resolved value into a presentation handle (e.g. a GPU texture).
pub trait Upload<T> {
    type Handle: Send + Sync + 'static;

    fn upload(&self, value: &T) -> Self::Handle;
}

/// Outcome of a [`TextureCache::realize`] call.
#[derive(Debug)]
pub enum Realized<H> {
    Ready(Arc<H>),
    /// Still resolving, or resolved to nothing. Callers draw a placeholder.
    Unavailable,
}

impl<H> Realized<H> {
    pub fn handle(self) -> Option<Arc<H>> {
        match self {
            Realized::Ready(handle) => Some(handle),
            Realized::Unavailable => None,
        }
    }
}

/// Per-id cache of uploaded handles, created at most once per id.
pub struct TextureCache<H> {
    handles: Mutex<HashMap<ResourceId, Arc<H>>>,
}

impl<H> Default for TextureCache<H> {
    fn default() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }
}

impl<H: Send + Sync + 'static> TextureCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `id`, uploading the resolved value on first success.
    ///
    /// Requests the id if nobody has yet and only ever polls the resolver, so
    /// it is safe to call every frame from the render thread.
    pub fn realize<R, U>(
        &self,
        resolver: &ResolverService<R>,
        uploader: &U,
        id: ResourceId,
    ) -> Result<Realized<H>, CacheError>
    where
        R: Resolve<Key = Arc<str>>,
        U: Upload<R::Output, Handle = H>,
    {
        if let Some(handle) = self.handles.lock().get(&id) {
            return Ok(Realized::Ready(Arc::clone(handle)));
        }

        let value = match resolver.fetch(id)? {
            Resolution::Ready(value) => value,
            Resolution::Pending | Resolution::Absent => return Ok(Realized::Unavailable),
        };

        let mut handles = self.handles.lock();
        let handle = handles
            .entry(id)
            .or_insert_with(|| {
                tracing::debug!(%id, "uploading resolved resource");
                Arc::new(uploader.upload(&value))
            })
            .clone();
        Ok(Realized::Ready(handle))
    }

    pub fn get(&self, id: ResourceId) -> Option<Arc<H>> {
        self.handles.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckcore_config::ResolverSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    struct Echo;

    impl Resolve for Echo {
        type Key = Arc<str>;
        type Output = String;

        fn resolve(&self, key: &Arc<str>) -> Option<String> {
            (!key.is_empty()).then(|| key.to_string())
        }
    }

    #[derive(Default)]
    struct CountingUploader {
        uploads: AtomicUsize,
    }

    impl Upload<String> for CountingUploader {
        type Handle = usize;

        fn upload(&self, value: &String) -> usize {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            value.len()
        }
    }

    #[test]
    fn realize_uploads_once_and_reuses_handle() {
        let service = ResolverService::new("realize", Echo, ResolverSettings::default()).unwrap();
        let textures = TextureCache::new();
        let uploader = CountingUploader::default();
        let id = service.intern("folder").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let first = loop {
            if let Realized::Ready(handle) = textures.realize(&service, &uploader, id).unwrap() {
                break handle;
            }
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        };
        let second = textures
            .realize(&service, &uploader, id)
            .unwrap()
            .handle()
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, "folder".len());
        assert_eq!(uploader.uploads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absent_resources_stay_unavailable() {
        let service = ResolverService::new("realize", Echo, ResolverSettings::default()).unwrap();
        let textures: TextureCache<usize> = TextureCache::new();
        let uploader = CountingUploader::default();
        let id = service.intern("").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while service.fetch(id).unwrap().is_pending() {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        assert!(textures
            .realize(&service, &uploader, id)
            .unwrap()
            .handle()
            .is_none());
        assert!(textures.is_empty());
        assert_eq!(uploader.uploads.load(Ordering::SeqCst), 0);
    }
}

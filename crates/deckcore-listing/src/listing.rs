use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use deckcore_cache::WorkerPool;
use parking_lot::Mutex;

use crate::entry::{DirectoryEntry, MetadataResolver};
use crate::generation::{Generation, ScanState};
use crate::source::{EntrySource, FsEntrySource};
use crate::ListingError;

pub type MetadataPool = WorkerPool<MetadataResolver>;

struct ScanHandle {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Live, sorted listing of one collection, filled by a background scanner.
///
/// Retargeting stops and joins the running scanner before the previous
/// generation is cleared, so readers only ever see entries of one target.
pub struct DirectoryListing<S: EntrySource = FsEntrySource> {
    shared: Arc<Mutex<Generation>>,
    source: Arc<S>,
    metadata: Arc<MetadataPool>,
    scan: Option<ScanHandle>,
}

impl DirectoryListing<FsEntrySource> {
    pub fn open(target: impl Into<PathBuf>, metadata: Arc<MetadataPool>) -> Result<Self, ListingError> {
        let mut listing = Self::new(FsEntrySource, metadata);
        listing.set_target(target)?;
        Ok(listing)
    }
}

impl<S: EntrySource> DirectoryListing<S> {
    pub fn new(source: S, metadata: Arc<MetadataPool>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Generation::new(PathBuf::new()))),
            source: Arc::new(source),
            metadata,
            scan: None,
        }
    }

    pub fn set_target(&mut self, target: impl Into<PathBuf>) -> Result<(), ListingError> {
        let target = target.into();
        self.stop();

        let number = {
            let mut generation = self.shared.lock();
            generation.reset(target.clone());
            generation.number()
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let scan = ScanContext {
            target: target.clone(),
            number,
            source: Arc::clone(&self.source),
            shared: Arc::clone(&self.shared),
            metadata: Arc::clone(&self.metadata),
            cancel: Arc::clone(&cancel),
        };

        let spawned = thread::Builder::new()
            .name(format!("scan-{number}"))
            .spawn(move || scan.run());
        match spawned {
            Ok(thread) => {
                self.scan = Some(ScanHandle { cancel, thread });
                Ok(())
            }
            Err(err) => {
                self.shared.lock().set_state(ScanState::Idle);
                Err(ListingError::Spawn { target, source: err })
            }
        }
    }

    /// Rescans the current target.
    pub fn refresh(&mut self) -> Result<(), ListingError> {
        let target = self.target();
        self.set_target(target)
    }

    /// Cancels the running scan, if any, and waits for its thread to exit.
    /// Entries it already published stay visible.
    pub fn stop(&mut self) {
        let Some(scan) = self.scan.take() else {
            return;
        };

        scan.cancel.store(true, Ordering::Release);
        if scan.thread.join().is_err() {
            tracing::error!("directory scanner panicked");
        }
    }

    pub fn target(&self) -> PathBuf {
        self.shared.lock().target().to_path_buf()
    }

    pub fn parent(&self) -> Option<PathBuf> {
        self.shared.lock().target().parent().map(Path::to_path_buf)
    }

    pub fn state(&self) -> ScanState {
        self.shared.lock().state()
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().number()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `f` against the current generation while holding the listing lock.
    /// Keep `f` short: the scanner waits on the same lock.
    pub fn with_generation<T>(&self, f: impl FnOnce(&Generation) -> T) -> T {
        f(&self.shared.lock())
    }

    /// Sorted copy of the current entries.
    pub fn snapshot(&self) -> Vec<DirectoryEntry> {
        self.with_generation(|generation| generation.sorted().cloned().collect())
    }

    /// Sorted copy of the entries accepted by `admit`.
    pub fn visible(&self, mut admit: impl FnMut(&DirectoryEntry) -> bool) -> Vec<DirectoryEntry> {
        self.with_generation(|generation| {
            generation
                .sorted()
                .filter(|entry| admit(entry))
                .cloned()
                .collect()
        })
    }
}

impl<S: EntrySource> Drop for DirectoryListing<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ScanContext<S: EntrySource> {
    target: PathBuf,
    number: u64,
    source: Arc<S>,
    shared: Arc<Mutex<Generation>>,
    metadata: Arc<MetadataPool>,
    cancel: Arc<AtomicBool>,
}

impl<S: EntrySource> ScanContext<S> {
    fn run(self) {
        tracing::info!(dir = %self.target.display(), generation = self.number, "scan started");
        let (state, found) = self.walk();
        self.shared.lock().set_state(state);
        tracing::info!(
            dir = %self.target.display(),
            generation = self.number,
            entries = found,
            ?state,
            "scan finished"
        );
    }

    fn walk(&self) -> (ScanState, usize) {
        let children = match self.source.children(&self.target) {
            Ok(children) => children,
            Err(err) => {
                tracing::warn!(dir = %self.target.display(), error = %err, "cannot enumerate");
                return (ScanState::Completed { partial: true }, 0);
            }
        };

        let mut found = 0usize;
        for child in children {
            if self.cancel.load(Ordering::Acquire) {
                return (ScanState::Cancelled, found);
            }

            let raw = match child {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(
                        dir = %self.target.display(),
                        error = %err,
                        "enumeration stopped early"
                    );
                    return (ScanState::Completed { partial: true }, found);
                }
            };

            let entry = DirectoryEntry::new(raw.path, raw.is_directory);
            if let Err(err) = self
                .metadata
                .submit(entry.metadata_request(), entry.info_sink())
            {
                tracing::debug!(path = %entry.path().display(), error = %err, "metadata not requested");
            }

            self.shared.lock().push(entry);
            found += 1;
        }

        if self.cancel.load(Ordering::Acquire) {
            (ScanState::Cancelled, found)
        } else {
            (ScanState::Completed { partial: false }, found)
        }
    }
}

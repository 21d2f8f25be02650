use std::collections::BTreeSet;
use std::ffi::OsString;

use crate::entry::DirectoryEntry;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexKey {
    /// 0 for directories so they order first.
    kind: u8,
    path: OsString,
    slot: usize,
}

/// Ordered view over an append-only entry store.
///
/// Holds positions into the store rather than references, so the store may
/// reallocate freely. Insertion is logarithmic in the number of indexed entries.
#[derive(Debug, Default, Clone)]
pub struct SortedIndex {
    keys: BTreeSet<IndexKey>,
}

impl SortedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: usize, entry: &DirectoryEntry) {
        self.keys.insert(IndexKey {
            kind: if entry.is_directory() { 0 } else { 1 },
            path: entry.path().as_os_str().to_owned(),
            slot,
        });
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Store positions in listing order.
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.iter().map(|key| key.slot)
    }
}

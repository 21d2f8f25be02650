use std::path::{Path, PathBuf};

use crate::entry::DirectoryEntry;
use crate::index::SortedIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// `partial` is set when enumeration hit an access error and stopped early.
    Completed { partial: bool },
    Cancelled,
}

impl ScanState {
    pub fn is_finished(self) -> bool {
        matches!(self, ScanState::Completed { .. } | ScanState::Cancelled)
    }
}

/// Entries and sorted index for one scan target.
#[derive(Debug)]
pub struct Generation {
    number: u64,
    target: PathBuf,
    state: ScanState,
    entries: Vec<DirectoryEntry>,
    index: SortedIndex,
}

impl Generation {
    pub fn new(target: PathBuf) -> Self {
        Self {
            number: 0,
            target,
            state: ScanState::Idle,
            entries: Vec::new(),
            index: SortedIndex::new(),
        }
    }

    /// Discards all entries and starts the next generation for `target`.
    pub fn reset(&mut self, target: PathBuf) {
        self.number += 1;
        self.target = target;
        self.state = ScanState::Scanning;
        self.entries.clear();
        self.index.clear();
    }

    /// Stores the entry and indexes it in one step.
    pub fn push(&mut self, entry: DirectoryEntry) {
        let slot = self.entries.len();
        self.index.insert(slot, &entry);
        self.entries.push(entry);
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ScanState) {
        self.state = state;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in discovery order.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Entries in listing order.
    pub fn sorted(&self) -> impl Iterator<Item = &DirectoryEntry> + '_ {
        self.index.slots().map(|slot| &self.entries[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_discards_previous_generation() {
        let mut generation = Generation::new(PathBuf::from("/a"));
        generation.reset(PathBuf::from("/a"));
        generation.push(DirectoryEntry::new(PathBuf::from("/a/z"), false));
        generation.push(DirectoryEntry::new(PathBuf::from("/a/y"), true));
        assert_eq!(generation.len(), 2);
        assert_eq!(
            generation.sorted().next().map(|e| e.path()),
            Some(Path::new("/a/y"))
        );

        generation.reset(PathBuf::from("/b"));
        assert_eq!(generation.number(), 2);
        assert!(generation.is_empty());
        assert_eq!(generation.sorted().count(), 0);
        assert_eq!(generation.state(), ScanState::Scanning);
        assert_eq!(generation.target(), Path::new("/b"));
    }
}

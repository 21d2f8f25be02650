//! Incremental directory listings.
//!
//! A background scanner appends children into a [`Generation`] while the
//! reader iterates it in sorted order at any time. Metadata for each entry
//! is resolved on a shared [`MetadataPool`].

mod entry;
mod generation;
mod index;
mod listing;
mod source;

use std::path::PathBuf;

pub use entry::{
    entry_order, thumbnail_file_name, DirectoryEntry, FileInfo, MetadataRequest,
    MetadataResolver, DIRECTORY_CONTENT_TYPE,
};
pub use generation::{Generation, ScanState};
pub use index::SortedIndex;
pub use listing::{DirectoryListing, MetadataPool};
pub use source::{Children, EntrySource, FsEntrySource, RawEntry};

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("failed to start scanner for {target}: {source}")]
    Spawn {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub path: PathBuf,
    pub is_directory: bool,
}

pub type Children = Box<dyn Iterator<Item = io::Result<RawEntry>> + Send>;

/// Enumerates the immediate children of a collection in native order.
///
/// An `Err` item ends the scan early; everything yielded before it stays listed.
pub trait EntrySource: Send + Sync + 'static {
    fn children(&self, target: &Path) -> io::Result<Children>;
}

/// Directory enumeration backed by `walkdir`, one level deep.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsEntrySource;

impl EntrySource for FsEntrySource {
    fn children(&self, target: &Path) -> io::Result<Children> {
        let walker = WalkDir::new(target)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .map(|entry| {
                let entry = entry.map_err(io::Error::from)?;
                let file_type = entry.file_type();
                // Symlinks count as directories when their target is one.
                let is_directory = file_type.is_dir()
                    || (file_type.is_symlink() && entry.path().is_dir());
                Ok(RawEntry {
                    path: entry.into_path(),
                    is_directory,
                })
            });
        Ok(Box::new(walker))
    }
}

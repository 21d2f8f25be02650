use std::cmp::Ordering;
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use deckcore_cache::{Resolution, ResultCell, Resolve, Sink};
use md5::{Digest, Md5};
use url::Url;

pub const DIRECTORY_CONTENT_TYPE: &str = "inode/directory";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const THUMBNAIL_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "ico"];
/// Freedesktop thumbnail cache buckets, smallest first.
const THUMBNAIL_BUCKETS: [&str; 4] = ["normal", "large", "x-large", "xx-large"];

/// Metadata resolved off-thread for a listed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub content_type: String,
    pub icon_names: Vec<String>,
    pub thumbnail: Option<PathBuf>,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
}

impl FileInfo {
    pub fn for_content_type(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            icon_names: icon_names_for(content_type),
            thumbnail: None,
            size: None,
            modified: None,
        }
    }

    /// Icon names to try in order: the thumbnail first, then themed names.
    pub fn icon_candidates(&self) -> impl Iterator<Item = &str> {
        self.thumbnail
            .iter()
            .filter_map(|path| path.to_str())
            .chain(self.icon_names.iter().map(String::as_str))
    }
}

fn icon_names_for(content_type: &str) -> Vec<String> {
    if content_type == DIRECTORY_CONTENT_TYPE {
        return vec!["folder".to_string(), "inode-directory".to_string()];
    }

    let mut names = vec![content_type.replace('/', "-")];
    if let Some((top, _)) = content_type.split_once('/') {
        let generic = match top {
            "audio" | "video" | "image" | "text" | "font" => Some(format!("{top}-x-generic")),
            "application" => Some("application-x-generic".to_string()),
            _ => None,
        };
        names.extend(generic);
    }
    names.push("unknown".to_string());
    names
}

/// One child of a listed directory. `path` and `is_directory` never change
/// after construction; `info` is fulfilled once by the metadata worker.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    path: PathBuf,
    is_directory: bool,
    info: Sink<FileInfo>,
}

impl DirectoryEntry {
    pub fn new(path: PathBuf, is_directory: bool) -> Self {
        Self {
            path,
            is_directory,
            info: Arc::new(ResultCell::pending()),
        }
    }

    pub fn with_info(path: PathBuf, is_directory: bool, info: FileInfo) -> Self {
        Self {
            path,
            is_directory,
            info: Arc::new(ResultCell::resolved(Some(info))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn is_hidden(&self) -> bool {
        self.file_name().as_encoded_bytes().first() == Some(&b'.')
    }

    pub fn info(&self) -> Resolution<FileInfo> {
        self.info.state()
    }

    pub(crate) fn info_sink(&self) -> Sink<FileInfo> {
        Arc::clone(&self.info)
    }

    pub fn metadata_request(&self) -> MetadataRequest {
        MetadataRequest {
            path: self.path.clone(),
            is_directory: self.is_directory,
        }
    }
}

/// Listing order: directories first, then paths ascending byte-wise.
pub fn entry_order(a: &DirectoryEntry, b: &DirectoryEntry) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.path.as_os_str().cmp(b.path.as_os_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub path: PathBuf,
    pub is_directory: bool,
}

/// Reads filesystem attributes and guesses the content type of a path.
///
/// Thumbnails come from the freedesktop thumbnail cache when one exists for
/// the file; raster images otherwise stand in for their own thumbnail.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    thumbnail_roots: Vec<PathBuf>,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self {
            thumbnail_roots: default_thumbnail_root().into_iter().collect(),
        }
    }
}

impl MetadataResolver {
    pub fn with_thumbnail_root(root: impl Into<PathBuf>) -> Self {
        Self {
            thumbnail_roots: vec![root.into()],
        }
    }

    pub fn without_thumbnail_cache() -> Self {
        Self {
            thumbnail_roots: Vec::new(),
        }
    }

    fn cached_thumbnail(&self, path: &Path) -> Option<PathBuf> {
        if self.thumbnail_roots.is_empty() {
            return None;
        }
        let file_name = thumbnail_file_name(path)?;
        self.thumbnail_roots.iter().find_map(|root| {
            THUMBNAIL_BUCKETS
                .iter()
                .map(|bucket| root.join(bucket).join(&file_name))
                .find(|candidate| candidate.is_file())
        })
    }
}

/// Cache file name for `path`: the MD5 of its `file://` URI, in hex, plus `.png`.
pub fn thumbnail_file_name(path: &Path) -> Option<String> {
    let uri = Url::from_file_path(path).ok()?;
    let digest = Md5::digest(uri.as_str().as_bytes());
    Some(format!("{digest:x}.png"))
}

fn default_thumbnail_root() -> Option<PathBuf> {
    match env::var_os("XDG_CACHE_HOME") {
        Some(cache) if !cache.is_empty() => Some(PathBuf::from(cache).join("thumbnails")),
        _ => env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache/thumbnails")),
    }
}

impl Resolve for MetadataResolver {
    type Key = MetadataRequest;
    type Output = FileInfo;

    fn resolve(&self, request: &MetadataRequest) -> Option<FileInfo> {
        let content_type = if request.is_directory {
            DIRECTORY_CONTENT_TYPE.to_string()
        } else {
            mime_guess::from_path(&request.path)
                .first_raw()
                .unwrap_or(FALLBACK_CONTENT_TYPE)
                .to_string()
        };

        let mut info = FileInfo::for_content_type(&content_type);
        match std::fs::metadata(&request.path) {
            Ok(meta) => {
                info.size = meta.is_file().then(|| meta.len());
                info.modified = meta.modified().ok();
            }
            Err(err) => {
                tracing::debug!(path = %request.path.display(), error = %err, "metadata unavailable");
            }
        }

        if !request.is_directory && request.path.is_absolute() {
            let is_raster = request
                .path
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| THUMBNAIL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            info.thumbnail = self
                .cached_thumbnail(&request.path)
                .or_else(|| is_raster.then(|| request.path.clone()));
        }

        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_sort_before_files_then_by_path() {
        let mut entries = vec![
            DirectoryEntry::new(PathBuf::from("/d/b.txt"), false),
            DirectoryEntry::new(PathBuf::from("/d/a.txt"), false),
            DirectoryEntry::new(PathBuf::from("/d/zeta"), true),
            DirectoryEntry::new(PathBuf::from("/d/A"), true),
        ];
        entries.sort_by(entry_order);

        let names: Vec<_> = entries
            .iter()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["A", "zeta", "a.txt", "b.txt"]);
    }

    #[test]
    fn hidden_detection_uses_file_name() {
        assert!(DirectoryEntry::new(PathBuf::from("/home/u/.config"), true).is_hidden());
        assert!(!DirectoryEntry::new(PathBuf::from("/home/.u/movie.mkv"), false).is_hidden());
    }

    #[test]
    fn resolver_guesses_content_types() {
        let resolver = MetadataResolver::without_thumbnail_cache();
        let video = resolver
            .resolve(&MetadataRequest {
                path: PathBuf::from("/nowhere/clip.mp4"),
                is_directory: false,
            })
            .unwrap();
        assert_eq!(video.content_type, "video/mp4");
        assert_eq!(video.icon_names[..2], ["video-mp4", "video-x-generic"]);
        assert_eq!(video.size, None);

        let dir = resolver
            .resolve(&MetadataRequest {
                path: PathBuf::from("/nowhere/Movies"),
                is_directory: true,
            })
            .unwrap();
        assert_eq!(dir.content_type, DIRECTORY_CONTENT_TYPE);
        assert_eq!(dir.icon_candidates().next(), Some("folder"));
    }

    #[test]
    fn images_offer_themselves_as_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("photo.png");
        std::fs::write(&photo, b"not really").unwrap();

        let info = MetadataResolver::without_thumbnail_cache()
            .resolve(&MetadataRequest {
                path: photo.clone(),
                is_directory: false,
            })
            .unwrap();
        assert_eq!(info.size, Some(10));
        assert_eq!(info.icon_candidates().next(), photo.to_str());
    }

    #[cfg(unix)]
    #[test]
    fn thumbnail_names_hash_the_file_uri() {
        assert_eq!(
            thumbnail_file_name(Path::new("/home/jens/photos/me.png")).as_deref(),
            Some("c6ee772d9e49320e97ec29a7eb5b1697.png")
        );
        assert_eq!(thumbnail_file_name(Path::new("relative/me.png")), None);
    }

    #[test]
    fn cached_thumbnail_is_preferred() {
        let media = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let clip = media.path().join("clip.mkv");
        std::fs::write(&clip, b"").unwrap();
        let photo = media.path().join("photo.jpg");
        std::fs::write(&photo, b"").unwrap();

        let cached = cache
            .path()
            .join("large")
            .join(thumbnail_file_name(&clip).unwrap());
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, b"png").unwrap();

        let resolver = MetadataResolver::with_thumbnail_root(cache.path());
        let resolve = |path: &Path| {
            resolver
                .resolve(&MetadataRequest {
                    path: path.to_path_buf(),
                    is_directory: false,
                })
                .unwrap()
        };
        assert_eq!(resolve(&clip).thumbnail, Some(cached.clone()));
        assert_eq!(resolve(&clip).icon_candidates().next(), cached.to_str());
        assert_eq!(resolve(&photo).thumbnail, Some(photo.clone()));

        let folder = resolver
            .resolve(&MetadataRequest {
                path: media.path().to_path_buf(),
                is_directory: true,
            })
            .unwrap();
        assert_eq!(folder.thumbnail, None);
    }
}

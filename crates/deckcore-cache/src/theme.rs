use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use deckcore_config::IconSettings;
use walkdir::WalkDir;

const RASTER_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const PIXMAPS_DIR: &str = "/usr/share/pixmaps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    theme: usize,
    /// 0: fits the requested size, 1: larger than requested, 2: unsized.
    fit: u8,
    distance: u32,
}

/// Freedesktop-style icon theme lookup over raster icons.
///
/// The name index is built on first lookup by walking every theme directory
/// once; later lookups only read the map.
pub struct IconTheme {
    roots: Vec<PathBuf>,
    themes: Vec<String>,
    size: u32,
    pixmaps: Option<PathBuf>,
    index: OnceLock<HashMap<String, PathBuf>>,
}

impl IconTheme {
    pub fn from_settings(settings: &IconSettings) -> Self {
        let mut theme =
            Self::with_roots(default_icon_roots(), settings.theme_chain(), settings.size);
        theme.pixmaps = Some(PathBuf::from(PIXMAPS_DIR));
        theme
    }

    pub fn with_roots(roots: Vec<PathBuf>, themes: Vec<String>, size: u32) -> Self {
        Self {
            roots,
            themes,
            size,
            pixmaps: None,
            index: OnceLock::new(),
        }
    }

    /// Requested icon edge in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.index.get_or_init(|| self.build_index()).get(name).cloned()
    }

    fn build_index(&self) -> HashMap<String, PathBuf> {
        let mut best: HashMap<String, (Rank, PathBuf)> = HashMap::new();
        let mut offer = |name: String, rank: Rank, path: PathBuf| match best.get(&name) {
            Some((current, _)) if *current <= rank => {}
            _ => {
                best.insert(name, (rank, path));
            }
        };

        for (theme_rank, theme) in self.themes.iter().enumerate() {
            for root in &self.roots {
                let theme_dir = root.join(theme);
                if !theme_dir.is_dir() {
                    continue;
                }

                for entry in WalkDir::new(&theme_dir)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(Result::ok)
                {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Some(name) = raster_icon_name(entry.path()) else {
                        continue;
                    };

                    let rank = match icon_dir_size(&theme_dir, entry.path()) {
                        Some(size) if size <= self.size => Rank {
                            theme: theme_rank,
                            fit: 0,
                            distance: self.size - size,
                        },
                        Some(size) => Rank {
                            theme: theme_rank,
                            fit: 1,
                            distance: size - self.size,
                        },
                        None => Rank {
                            theme: theme_rank,
                            fit: 2,
                            distance: 0,
                        },
                    };
                    offer(name, rank, entry.into_path());
                }
            }
        }

        let pixmaps = self.pixmaps.as_deref().map(std::fs::read_dir);
        if let Some(Ok(read_dir)) = pixmaps {
            for entry in read_dir.filter_map(Result::ok) {
                let path = entry.path();
                if let Some(name) = raster_icon_name(&path) {
                    let rank = Rank {
                        theme: self.themes.len(),
                        fit: 2,
                        distance: 0,
                    };
                    offer(name, rank, path);
                }
            }
        }

        tracing::info!(icons = best.len(), themes = ?self.themes, "icon theme indexed");
        best.into_iter()
            .map(|(name, (_, path))| (name, path))
            .collect()
    }
}

fn raster_icon_name(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !RASTER_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(path.file_stem()?.to_str()?.to_string())
}

/// Extracts the pixel size from a theme subdirectory such as `48x48/apps`
/// or `apps/48`.
fn icon_dir_size(theme_dir: &Path, icon: &Path) -> Option<u32> {
    let relative = icon.strip_prefix(theme_dir).ok()?;
    relative
        .parent()?
        .components()
        .filter_map(|part| part.as_os_str().to_str())
        .find_map(|part| {
            let part = part.split('@').next().unwrap_or(part);
            match part.split_once('x') {
                Some((w, h)) if w == h => w.parse().ok(),
                Some(_) => None,
                None => part.parse().ok(),
            }
        })
}

fn default_icon_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let home = env::var_os("HOME").map(PathBuf::from);

    match env::var_os("XDG_DATA_HOME") {
        Some(data_home) if !data_home.is_empty() => {
            roots.push(PathBuf::from(data_home).join("icons"))
        }
        _ => {
            if let Some(home) = &home {
                roots.push(home.join(".local/share/icons"));
            }
        }
    }
    if let Some(home) = &home {
        roots.push(home.join(".icons"));
    }

    let data_dirs = env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    roots.extend(
        data_dirs
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(|dir| PathBuf::from(dir).join("icons")),
    );
    roots
}

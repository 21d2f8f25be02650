use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub show_hidden: bool,
    pub only_media: bool,
    pub start_dir: Option<PathBuf>,
    pub icons: IconSettings,
    pub resolver: ResolverSettings,
    pub video_player: VideoPlayerSettings,
    pub gamescope: GamescopeSettings,
    pub window_refresh_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_hidden: false,
            only_media: true,
            start_dir: None,
            icons: IconSettings::default(),
            resolver: ResolverSettings::default(),
            video_player: VideoPlayerSettings::default(),
            gamescope: GamescopeSettings::default(),
            window_refresh_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconSettings {
    pub theme: Option<String>,
    pub fallback_themes: Vec<String>,
    pub size: u32,
}

impl Default for IconSettings {
    fn default() -> Self {
        Self {
            theme: None,
            fallback_themes: ["Adwaita", "gnome", "oxygen", "hicolor"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            size: 512,
        }
    }
}

impl IconSettings {
    /// Themes in lookup order: the configured one first, then the fallbacks.
    pub fn theme_chain(&self) -> Vec<String> {
        let mut chain = Vec::with_capacity(self.fallback_themes.len() + 1);
        if let Some(theme) = &self.theme {
            chain.push(theme.clone());
        }
        for theme in &self.fallback_themes {
            if !chain.contains(theme) {
                chain.push(theme.clone());
            }
        }
        chain
    }
}

/// Sizing of a resolution worker pool.
///
/// `queue_capacity` bounds the job queue shared by the workers; producers
/// block once it is full, so it has to stay well above the number of entries
/// a single directory scan submits in a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub queue_capacity: usize,
    pub workers: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    Sphere,
    Sphere360,
    Flat,
    Plane,
}

impl Projection {
    pub const ALL: [Projection; 4] = [
        Projection::Sphere,
        Projection::Sphere360,
        Projection::Flat,
        Projection::Plane,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Projection::Sphere => "Sphere",
            Projection::Sphere360 => "Sphere 360",
            Projection::Flat => "Flat",
            Projection::Plane => "Plane",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoPlayerSettings {
    pub program: String,
    pub overlay: bool,
    pub overlay_mouse: bool,
    pub zoom: f32,
    pub stretch: bool,
    pub left_to_right: bool,
    pub projection: Projection,
    pub overlay_width: f32,
}

impl Default for VideoPlayerSettings {
    fn default() -> Self {
        Self {
            program: "vr-video-player".to_string(),
            overlay: true,
            overlay_mouse: true,
            zoom: 0.0,
            stretch: true,
            left_to_right: true,
            projection: Projection::Plane,
            overlay_width: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamescopeSettings {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub physical_width: f32,
    pub extra_options: String,
}

impl Default for GamescopeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1920,
            height: 1080,
            physical_width: 2.0,
            extra_options: String::new(),
        }
    }
}

impl Settings {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Missing files yield defaults silently; unreadable or malformed ones
    /// yield defaults with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "using default settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn start_dir_or_current(&self) -> PathBuf {
        self.start_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let settings =
            Settings::from_json_str(r#"{ "show_hidden": true, "resolver": { "workers": 3 } }"#)
                .unwrap();
        assert!(settings.show_hidden);
        assert!(settings.only_media);
        assert_eq!(settings.resolver.workers, 3);
        assert_eq!(settings.resolver.queue_capacity, 4096);
        assert_eq!(settings.video_player.projection, Projection::Plane);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.gamescope.width = 2560;
        settings.video_player.projection = Projection::Flat;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse(_))));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
        assert_eq!(
            Settings::load_or_default(&dir.path().join("missing.json")),
            Settings::default()
        );
    }

    #[test]
    fn theme_chain_puts_configured_theme_first() {
        let icons = IconSettings {
            theme: Some("gnome".to_string()),
            ..IconSettings::default()
        };
        assert_eq!(
            icons.theme_chain(),
            vec!["gnome", "Adwaita", "oxygen", "hicolor"]
        );
    }
}

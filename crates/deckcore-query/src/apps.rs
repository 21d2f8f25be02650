use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

const DESKTOP_SECTION: &str = "[Desktop Entry]";

/// Field codes the launcher has nothing to substitute for.
const FIELD_CODES: [char; 13] = ['f', 'F', 'u', 'U', 'i', 'c', 'k', 'd', 'D', 'n', 'N', 'v', 'm'];

/// A launchable application described by a `.desktop` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub exec: String,
    pub icon: Option<String>,
}

impl Application {
    /// Parses the `[Desktop Entry]` group. Returns `None` for entries that
    /// should not be shown or cannot be launched.
    pub fn parse(id: &str, content: &str) -> Option<Application> {
        let mut in_section = false;
        let mut name = None;
        let mut exec = None;
        let mut icon = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_section = line == DESKTOP_SECTION;
                continue;
            }
            if !in_section {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Type" if value != "Application" => return None,
                "NoDisplay" | "Hidden" if value == "true" => return None,
                "Name" => name = Some(value.to_string()),
                "Exec" => exec = Some(strip_field_codes(value)),
                "Icon" if !value.is_empty() => icon = Some(value.to_string()),
                _ => {}
            }
        }

        let exec = exec.filter(|exec| !exec.is_empty())?;
        Some(Application {
            id: id.to_string(),
            name: name?,
            exec,
            icon,
        })
    }

    pub fn matches(&self, query_lower: &str) -> bool {
        self.name.to_lowercase().contains(query_lower)
    }
}

/// Removes `%x` placeholders from an `Exec` value; `%%` becomes `%`.
pub fn strip_field_codes(exec: &str) -> String {
    let mut out = String::with_capacity(exec.len());
    let mut chars = exec.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(code) if FIELD_CODES.contains(&code) => {
                chars.next();
                // A code standing alone as an argument leaves no gap behind.
                if chars.peek().map_or(true, |next| next.is_whitespace()) {
                    out.truncate(out.trim_end().len());
                }
            }
            _ => out.push(ch),
        }
    }

    out.trim().to_string()
}

/// Installed applications, sorted case-insensitively by name.
#[derive(Debug, Clone, Default)]
pub struct AppCatalog {
    applications: Vec<Application>,
}

impl AppCatalog {
    /// Loads every `.desktop` file under `dirs`. When two directories provide
    /// the same desktop id, the earlier directory wins.
    pub fn load(dirs: &[PathBuf]) -> AppCatalog {
        let mut seen = HashSet::new();
        let mut applications = Vec::new();

        for dir in dirs {
            for entry in WalkDir::new(dir)
                .min_depth(1)
                .follow_links(true)
                .into_iter()
                .filter_map(Result::ok)
            {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|ext| ext.to_str()) != Some("desktop")
                {
                    continue;
                }

                let Some(id) = desktop_id(dir, path) else {
                    continue;
                };
                if !seen.insert(id.clone()) {
                    continue;
                }

                let content = match std::fs::read_to_string(path) {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "skipping desktop file");
                        continue;
                    }
                };
                if let Some(app) = Application::parse(&id, &content) {
                    applications.push(app);
                }
            }
        }

        Self::from_applications(applications)
    }

    pub fn from_applications(mut applications: Vec<Application>) -> AppCatalog {
        applications.sort_by_cached_key(|app| app.name.to_lowercase());
        tracing::info!(count = applications.len(), "application catalog loaded");
        AppCatalog { applications }
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Applications whose name contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<&Application> {
        let query = query.trim().to_lowercase();
        self.applications
            .iter()
            .filter(|app| app.matches(&query))
            .collect()
    }
}

fn desktop_id(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|part| part.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("-"))
}

/// `$XDG_DATA_HOME/applications` followed by each `$XDG_DATA_DIRS/applications`.
pub fn default_application_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match env::var_os("XDG_DATA_HOME") {
        Some(data_home) if !data_home.is_empty() => dirs.push(PathBuf::from(data_home)),
        _ => {
            if let Some(home) = env::var_os("HOME") {
                dirs.push(PathBuf::from(home).join(".local/share"));
            }
        }
    }

    let data_dirs = env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    dirs.extend(
        data_dirs
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from),
    );

    dirs.into_iter().map(|dir| dir.join("applications")).collect()
}

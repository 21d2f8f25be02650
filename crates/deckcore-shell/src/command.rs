use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use deckcore_config::{GamescopeSettings, Projection, VideoPlayerSettings};
use serde::{Deserialize, Serialize};

/// A fully formed process invocation handed to a [`Launcher`](crate::Launcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Splits a desktop-style command line into program and arguments.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut words = split_command_line(line).into_iter();
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Word splitting with single quotes, double quotes and backslash escapes.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some('\''), '\'') | (Some('"'), '"') => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    word.push(next);
                }
            }
            (Some(_), ch) => word.push(ch),
            (None, '\'' | '"') => {
                quote = Some(ch);
                in_word = true;
            }
            (None, ch) if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            (None, ch) => {
                word.push(ch);
                in_word = true;
            }
        }
        if quote.is_some() || !word.is_empty() {
            in_word = true;
        }
    }

    if in_word {
        words.push(word);
    }
    words
}

/// What the video player should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoTarget {
    File(String),
    /// Native window handle to capture.
    Window(u64),
}

/// Overlay keys must be unique per launched overlay.
pub fn overlay_key() -> String {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("launcher-openvr-overlay-{ms}")
}

pub fn video_command(settings: &VideoPlayerSettings, target: &VideoTarget) -> CommandSpec {
    video_command_with_key(settings, target, &overlay_key())
}

pub fn video_command_with_key(
    settings: &VideoPlayerSettings,
    target: &VideoTarget,
    key: &str,
) -> CommandSpec {
    let mut command = CommandSpec::new(&settings.program)
        .arg(if settings.overlay_mouse {
            "--overlay-mouse"
        } else {
            "--no-overlay-mouse"
        })
        .args(["--overlay-key", key])
        .arg("--overlay-width")
        .arg(settings.overlay_width.to_string())
        .arg("--zoom")
        .arg(settings.zoom.to_string());

    if settings.overlay {
        command = command.arg("--overlay");
    }

    command = match settings.projection {
        Projection::Sphere => command.arg("--sphere"),
        Projection::Sphere360 => command.arg("--sphere360"),
        Projection::Plane => command.arg("--plane"),
        Projection::Flat => command
            .arg("--flat")
            .arg(if settings.left_to_right {
                "--left-right"
            } else {
                "--right-left"
            })
            .arg(if settings.stretch {
                "--stretch"
            } else {
                "--no-stretch"
            }),
    };

    match target {
        VideoTarget::File(path) => command.args(["--video", path.as_str()]),
        VideoTarget::Window(handle) => command.arg(handle.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPreset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const RESOLUTION_PRESETS: [ResolutionPreset; 6] = [
    ResolutionPreset {
        name: "720p",
        width: 1280,
        height: 720,
    },
    ResolutionPreset {
        name: "1080p",
        width: 1920,
        height: 1080,
    },
    ResolutionPreset {
        name: "1440p",
        width: 2560,
        height: 1440,
    },
    ResolutionPreset {
        name: "4k",
        width: 3840,
        height: 2160,
    },
    ResolutionPreset {
        name: "5k",
        width: 5120,
        height: 2880,
    },
    ResolutionPreset {
        name: "8k",
        width: 7680,
        height: 4320,
    },
];

/// Preset label for a resolution, `"Custom"` when none matches.
pub fn preset_name(width: u32, height: u32) -> &'static str {
    RESOLUTION_PRESETS
        .iter()
        .find(|preset| preset.width == width && preset.height == height)
        .map(|preset| preset.name)
        .unwrap_or("Custom")
}

/// Wraps an application command line in a gamescope OpenVR overlay session.
pub fn gamescope_command(settings: &GamescopeSettings, app_command_line: &str) -> CommandSpec {
    gamescope_command_with_key(settings, app_command_line, &overlay_key())
}

pub fn gamescope_command_with_key(
    settings: &GamescopeSettings,
    app_command_line: &str,
    key: &str,
) -> CommandSpec {
    CommandSpec::new("gamescope")
        .arg("-w")
        .arg(settings.width.to_string())
        .arg("-h")
        .arg(settings.height.to_string())
        .arg("--openvr")
        .arg("--vr-overlay-physical-width")
        .arg(settings.physical_width.to_string())
        .args([
            "--vr-overlay-enable-control-bar",
            "--vr-overlay-enable-control-bar-keyboard",
            "--vr-overlay-enable-control-bar-close",
            "--vr-overlay-key",
            key,
        ])
        .args(split_command_line(&settings.extra_options))
        .arg("--")
        .args(split_command_line(app_command_line))
}

//! Launch descriptions and the process launcher boundary.
//!
//! The core only builds [`CommandSpec`]s; a [`Launcher`] owns spawning and
//! the lifetime of whatever it starts.

mod command;

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;

pub use command::{
    gamescope_command, gamescope_command_with_key, overlay_key, preset_name, split_command_line,
    video_command, video_command_with_key, CommandSpec, ResolutionPreset, VideoTarget,
    RESOLUTION_PRESETS,
};

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("command has no program")]
    EmptyCommand,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait Launcher {
    fn spawn(&self, command: &CommandSpec) -> Result<(), ShellError>;
}

/// Starts child processes without waiting on them. Each child is reaped on a
/// small background thread once it exits.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    working_dir: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
        }
    }
}

impl Launcher for ProcessLauncher {
    fn spawn(&self, command: &CommandSpec) -> Result<(), ShellError> {
        if command.program.is_empty() {
            return Err(ShellError::EmptyCommand);
        }

        let mut process = Command::new(&command.program);
        process.args(&command.args).stdin(Stdio::null());
        if let Some(dir) = &self.working_dir {
            process.current_dir(dir);
        }

        let child = process.spawn().map_err(|source| ShellError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        tracing::info!(pid = child.id(), %command, "launched");
        reap(child);
        Ok(())
    }
}

fn reap(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => tracing::debug!(pid, %status, "child exited"),
            Err(err) => tracing::warn!(pid, error = %err, "failed to wait for child"),
        });
    if let Err(err) = spawned {
        tracing::warn!(pid, error = %err, "failed to start reaper thread");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_is_rejected() {
        let err = ProcessLauncher::new()
            .spawn(&CommandSpec::new(""))
            .unwrap_err();
        assert!(matches!(err, ShellError::EmptyCommand));
    }

    #[test]
    fn missing_program_reports_spawn_failure() {
        let err = ProcessLauncher::new()
            .spawn(&CommandSpec::new("deck-no-such-program-3f9a"))
            .unwrap_err();
        assert!(matches!(err, ShellError::Spawn { ref program, .. } if program == "deck-no-such-program-3f9a"));
    }

    #[cfg(unix)]
    #[test]
    fn spawns_without_waiting() {
        let dir = std::env::temp_dir();
        ProcessLauncher::in_dir(dir)
            .spawn(&CommandSpec::new("true"))
            .unwrap();
    }

    #[cfg(target_os = "linux")]
    fn zombie_children() -> Vec<u32> {
        let me = std::process::id();
        let Ok(dir) = std::fs::read_dir("/proc") else {
            return Vec::new();
        };
        dir.filter_map(Result::ok)
            .filter_map(|entry| {
                let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
                let stat = std::fs::read_to_string(entry.path().join("stat")).ok()?;
                let (_, rest) = stat.rsplit_once(')')?;
                let mut fields = rest.split_whitespace();
                let state = fields.next()?;
                let parent: u32 = fields.next()?.parse().ok()?;
                (parent == me && state == "Z").then_some(pid)
            })
            .collect()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn exited_children_are_reaped() {
        use std::time::{Duration, Instant};

        let launcher = ProcessLauncher::new();
        for _ in 0..5 {
            launcher.spawn(&CommandSpec::new("true")).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let zombies = zombie_children();
            if zombies.is_empty() {
                break;
            }
            assert!(Instant::now() < deadline, "children left unreaped: {zombies:?}");
            thread::sleep(Duration::from_millis(10));
        }
    }
}

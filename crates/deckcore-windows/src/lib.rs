//! Listing of capturable top-level windows.
//!
//! Enumeration itself lives behind [`WindowSource`]; this crate keeps the
//! latest snapshot fresh on a background thread and realizes window icons.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use deckcore_cache::{Icon, Resolution, ResultCell, Sink, Upload};
use parking_lot::Mutex;

/// One window as reported by the window system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWindow {
    pub handle: u64,
    pub title: Option<String>,
    pub icon: Option<Icon>,
}

pub trait WindowSource: Send + 'static {
    fn windows(&self) -> io::Result<Vec<RawWindow>>;
}

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("failed to start window refresh thread: {0}")]
    Spawn(#[source] io::Error),
}

/// A listed window. Its icon arrives with the enumeration, so the icon cell
/// is resolved from the start.
pub struct WindowEntry<H> {
    handle: u64,
    title: Option<String>,
    icon: Sink<Icon>,
    texture: OnceLock<Arc<H>>,
}

impl<H> WindowEntry<H> {
    pub fn new(raw: RawWindow) -> Self {
        Self {
            handle: raw.handle,
            title: raw.title,
            icon: Arc::new(ResultCell::resolved(raw.icon)),
            texture: OnceLock::new(),
        }
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn display_title(&self) -> &str {
        self.title().unwrap_or("?")
    }

    pub fn icon(&self) -> Resolution<Icon> {
        self.icon.state()
    }

    /// Uploads the window icon on first call and returns the same handle after.
    pub fn texture<U>(&self, uploader: &U) -> Option<Arc<H>>
    where
        U: Upload<Icon, Handle = H>,
    {
        if let Some(texture) = self.texture.get() {
            return Some(Arc::clone(texture));
        }
        let icon = self.icon.value()?;
        Some(Arc::clone(
            self.texture.get_or_init(|| Arc::new(uploader.upload(icon))),
        ))
    }
}

struct WindowSnapshot<H> {
    number: u64,
    entries: Vec<Arc<WindowEntry<H>>>,
}

enum Control {
    Refresh,
    Stop,
}

/// Window list refreshed in the background while it is not on screen, so the
/// list a user is looking at never changes under them.
pub struct WindowListing<H> {
    shared: Arc<Mutex<WindowSnapshot<H>>>,
    shown: Arc<AtomicBool>,
    control: Sender<Control>,
    thread: Option<JoinHandle<()>>,
}

impl<H: Send + Sync + 'static> WindowListing<H> {
    pub fn start<S: WindowSource>(source: S, interval: Duration) -> Result<Self, WindowError> {
        let shared = Arc::new(Mutex::new(WindowSnapshot {
            number: 0,
            entries: Vec::new(),
        }));
        let shown = Arc::new(AtomicBool::new(false));
        let (control, commands) = unbounded();

        let thread = {
            let shared = Arc::clone(&shared);
            let shown = Arc::clone(&shown);
            thread::Builder::new()
                .name("window-refresh".to_string())
                .spawn(move || {
                    let mut force = false;
                    loop {
                        if force || !shown.load(Ordering::Acquire) {
                            refresh(&source, &shared);
                        }
                        match commands.recv_timeout(interval) {
                            Ok(Control::Refresh) => force = true,
                            Err(RecvTimeoutError::Timeout) => force = false,
                            Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    tracing::debug!("window refresh stopped");
                })
                .map_err(WindowError::Spawn)?
        };

        Ok(Self {
            shared,
            shown,
            control,
            thread: Some(thread),
        })
    }

    pub fn show(&self) {
        self.shown.store(true, Ordering::Release);
    }

    pub fn hide(&self) {
        self.shown.store(false, Ordering::Release);
    }

    pub fn is_shown(&self) -> bool {
        self.shown.load(Ordering::Acquire)
    }

    /// Enumerates again right away, even while shown.
    pub fn refresh_now(&self) {
        let _ = self.control.send(Control::Refresh);
    }

    /// Number of snapshots published so far.
    pub fn generation(&self) -> u64 {
        self.shared.lock().number
    }

    pub fn entries(&self) -> Vec<Arc<WindowEntry<H>>> {
        self.shared.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the refresh thread, interrupting its sleep. Idempotent.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.control.send(Control::Stop);
        if thread.join().is_err() {
            tracing::error!("window refresh thread panicked");
        }
    }
}

impl<H> Drop for WindowListing<H> {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.control.send(Control::Stop);
        let _ = thread.join();
    }
}

fn refresh<S: WindowSource, H>(source: &S, shared: &Mutex<WindowSnapshot<H>>) {
    let windows = match source.windows() {
        Ok(windows) => windows,
        Err(err) => {
            tracing::warn!(error = %err, "window enumeration failed");
            return;
        }
    };

    let entries: Vec<_> = windows
        .into_iter()
        .map(|raw| Arc::new(WindowEntry::new(raw)))
        .collect();
    let count = entries.len();

    let mut snapshot = shared.lock();
    snapshot.entries = entries;
    snapshot.number += 1;
    tracing::debug!(windows = count, generation = snapshot.number, "window list refreshed");
}

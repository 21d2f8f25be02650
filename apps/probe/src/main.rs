use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use deckcore_cache::{Icon, Realized, Upload};
use deckcore_config::Settings;
use deckcore_listing::{DirectoryEntry, DirectoryListing};
use deckcore_shell::{Launcher, ProcessLauncher};
use deckd::DeckService;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DECK_LOG";
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Stands in for a GPU upload: the probe only reports icon sizes.
struct IconSize;

impl Upload<Icon> for IconSize {
    type Handle = [u32; 2];

    fn upload(&self, icon: &Icon) -> [u32; 2] {
        [icon.width, icon.height]
    }
}

#[derive(Debug, Default)]
struct Options {
    settings_path: Option<PathBuf>,
    dir: Option<PathBuf>,
    show_hidden: bool,
    all_files: bool,
    apps: Option<String>,
    launch: Option<String>,
    timeout: Option<Duration>,
    write_settings: bool,
}

fn options_from_args() -> anyhow::Result<Options> {
    let mut options = Options::default();
    for arg in env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--settings=") {
            options.settings_path = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--dir=") {
            options.dir = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--apps=") {
            options.apps = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("--launch=") {
            options.launch = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("--timeout-ms=") {
            let ms = value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid --timeout-ms value {value:?}"))?;
            options.timeout = Some(Duration::from_millis(ms));
        } else if arg == "--show-hidden" {
            options.show_hidden = true;
        } else if arg == "--all" {
            options.all_files = true;
        } else if arg == "--write-settings" {
            options.write_settings = true;
        } else {
            bail!("unknown argument {arg:?}");
        }
    }
    Ok(options)
}

fn default_settings_path() -> PathBuf {
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("deck").join("settings.json")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = options_from_args()?;
    let settings_path = options
        .settings_path
        .clone()
        .unwrap_or_else(default_settings_path);
    let mut settings = Settings::load_or_default(&settings_path);
    settings.show_hidden |= options.show_hidden;
    if options.all_files {
        settings.only_media = false;
    }
    if let Some(dir) = &options.dir {
        settings.start_dir = Some(dir.clone());
    }
    if options.write_settings {
        settings
            .save(&settings_path)
            .with_context(|| format!("saving settings to {}", settings_path.display()))?;
    }

    let timeout = options
        .timeout
        .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
    let target = settings.start_dir_or_current();
    let deck = DeckService::new(settings, IconSize).context("starting deck service")?;

    if let Some(query) = &options.apps {
        print_applications(&deck, query);
    }

    let listing = deck
        .open_listing(&target)
        .with_context(|| format!("listing {}", target.display()))?;
    wait_for_listing(&listing, timeout);

    let visible = deck.visible_entries(&listing);
    println!("{} ({:?})", target.display(), listing.state());
    for entry in &visible {
        print_entry(&deck, entry, timeout);
    }

    if let Some(name) = &options.launch {
        let entry = visible
            .iter()
            .find(|entry| entry.file_name().to_string_lossy() == name.as_str())
            .with_context(|| format!("{name:?} is not in the listing"))?;
        if entry.is_directory() {
            bail!("{name:?} is a directory");
        }
        let command = deck.file_command(entry.path());
        ProcessLauncher::new()
            .spawn(&command)
            .with_context(|| format!("launching {command}"))?;
        println!("launched: {command}");
    }

    drop(listing);
    deck.shutdown();
    Ok(())
}

fn wait_for_listing(listing: &DirectoryListing, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let settled = listing.state().is_finished()
            && listing.with_generation(|generation| {
                generation.entries().iter().all(|entry| !entry.info().is_pending())
            });
        if settled {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    tracing::warn!(?timeout, "listing did not settle in time");
}

fn poll_icon(
    mut realize: impl FnMut() -> anyhow::Result<Realized<[u32; 2]>>,
    timeout: Duration,
) -> anyhow::Result<Option<[u32; 2]>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Realized::Ready(size) = realize()? {
            return Ok(Some(*size));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn describe_icon(size: anyhow::Result<Option<[u32; 2]>>) -> String {
    match size {
        Ok(Some([width, height])) => format!("{width}x{height}"),
        Ok(None) => "-".to_string(),
        Err(err) => format!("error: {err}"),
    }
}

fn print_entry(deck: &DeckService<IconSize>, entry: &DirectoryEntry, timeout: Duration) {
    let kind = if entry.is_directory() { "dir " } else { "file" };
    let content_type = entry
        .info()
        .ready()
        .map(|info| info.content_type.clone())
        .unwrap_or_else(|| "?".to_string());
    let icon = poll_icon(|| Ok(deck.entry_icon(entry)?), timeout / 10);
    println!(
        "  {kind} {:<40} {:<28} {}",
        entry.file_name().to_string_lossy(),
        content_type,
        describe_icon(icon)
    );
}

fn print_applications(deck: &DeckService<IconSize>, query: &str) {
    let catalog = deck.application_catalog();
    let matches = catalog.search(query);
    println!("applications matching {query:?}: {}", matches.len());
    for app in matches {
        let command = deck
            .application_command(app)
            .map(|command| command.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<32} {}", app.name, command);
    }
}

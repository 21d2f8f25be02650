//! Service object wiring the core together.
//!
//! [`DeckService`] owns the icon resolver, the texture cache and the metadata
//! worker pool. Construct one at startup, hand out references, and call
//! [`DeckService::shutdown`] once every listing it opened has been dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use deckcore_cache::{
    CacheError, Icon, IconResolver, IconService, IconTheme, Realized, Resolution, TextureCache,
    Upload, WorkerPool,
};
use deckcore_config::Settings;
use deckcore_listing::{DirectoryEntry, DirectoryListing, ListingError, MetadataPool, MetadataResolver};
use deckcore_query::{default_application_dirs, AppCatalog, Application, ListingFilter};
use deckcore_shell::{gamescope_command, video_command, CommandSpec, VideoTarget};
use deckcore_windows::{WindowError, WindowListing, WindowSource};

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Listing(#[from] ListingError),
    #[error(transparent)]
    Windows(#[from] WindowError),
}

pub struct DeckService<U: Upload<Icon>> {
    settings: Settings,
    icons: Arc<IconService>,
    textures: TextureCache<U::Handle>,
    uploader: U,
    metadata: Arc<MetadataPool>,
}

impl<U: Upload<Icon>> DeckService<U> {
    pub fn new(settings: Settings, uploader: U) -> Result<Self, DeckError> {
        let theme = IconTheme::from_settings(&settings.icons);
        Self::with_icon_theme(settings, theme, uploader)
    }

    pub fn with_icon_theme(
        settings: Settings,
        theme: IconTheme,
        uploader: U,
    ) -> Result<Self, DeckError> {
        let icons = IconService::new("icons", IconResolver::new(theme), settings.resolver)?;
        let metadata = WorkerPool::new("metadata", MetadataResolver::default(), settings.resolver)?;
        tracing::info!(
            workers = settings.resolver.workers,
            queue_capacity = settings.resolver.queue_capacity,
            "deck service started"
        );

        Ok(Self {
            settings,
            icons: Arc::new(icons),
            textures: TextureCache::new(),
            uploader,
            metadata: Arc::new(metadata),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn icons(&self) -> &Arc<IconService> {
        &self.icons
    }

    pub fn metadata(&self) -> &Arc<MetadataPool> {
        &self.metadata
    }

    /// First realized icon among `names`, tried in order.
    ///
    /// Every candidate is requested; pending and absent ones are skipped, so a
    /// later fallback shows until the preferred icon has been decoded.
    pub fn icon_texture<'a, I>(&self, names: I) -> Result<Realized<U::Handle>, DeckError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            let id = self.icons.intern(name)?;
            let realized = self.textures.realize(&self.icons, &self.uploader, id)?;
            if let Realized::Ready(handle) = realized {
                return Ok(Realized::Ready(handle));
            }
        }
        Ok(Realized::Unavailable)
    }

    pub fn entry_icon(&self, entry: &DirectoryEntry) -> Result<Realized<U::Handle>, DeckError> {
        match entry.info() {
            Resolution::Ready(info) => self.icon_texture(info.icon_candidates()),
            Resolution::Pending | Resolution::Absent => Ok(Realized::Unavailable),
        }
    }

    pub fn application_icon(&self, app: &Application) -> Result<Realized<U::Handle>, DeckError> {
        self.icon_texture(app.icon.as_deref())
    }

    pub fn open_listing(&self, target: impl Into<PathBuf>) -> Result<DirectoryListing, DeckError> {
        Ok(DirectoryListing::open(target, Arc::clone(&self.metadata))?)
    }

    pub fn filter(&self) -> ListingFilter {
        ListingFilter::from_settings(&self.settings)
    }

    /// Sorted entries of `listing` that pass the configured filter.
    pub fn visible_entries(&self, listing: &DirectoryListing) -> Vec<DirectoryEntry> {
        let filter = self.filter();
        listing.visible(|entry| filter.admits(entry))
    }

    pub fn window_listing<S: WindowSource>(
        &self,
        source: S,
    ) -> Result<WindowListing<U::Handle>, DeckError> {
        let interval = Duration::from_secs(self.settings.window_refresh_secs.max(1));
        Ok(WindowListing::start(source, interval)?)
    }

    pub fn application_catalog(&self) -> AppCatalog {
        AppCatalog::load(&default_application_dirs())
    }

    pub fn file_command(&self, path: &Path) -> CommandSpec {
        video_command(
            &self.settings.video_player,
            &VideoTarget::File(path.to_string_lossy().into_owned()),
        )
    }

    pub fn window_command(&self, handle: u64) -> CommandSpec {
        video_command(&self.settings.video_player, &VideoTarget::Window(handle))
    }

    /// Launch command for an application, wrapped in gamescope when enabled.
    pub fn application_command(&self, app: &Application) -> Option<CommandSpec> {
        if self.settings.gamescope.enabled {
            Some(gamescope_command(&self.settings.gamescope, &app.exec))
        } else {
            CommandSpec::from_command_line(&app.exec)
        }
    }

    /// Drains and joins both worker pools. Drop every listing first.
    pub fn shutdown(&self) {
        self.metadata.shutdown();
        self.icons.shutdown();
        tracing::info!(textures = self.textures.len(), "deck service stopped");
    }
}

impl<U: Upload<Icon>> Drop for DeckService<U> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Asynchronous, memoizing resolution of named resources.
//!
//! Names are interned to [`ResourceId`]s, resolved once on a background
//! [`WorkerPool`], and read back through non-blocking polls. A
//! [`TextureCache`] turns resolved values into presentation handles lazily.

mod cell;
mod icon;
mod identity;
mod service;
mod texture;
mod theme;
mod worker;

pub use cell::{Resolution, ResultCell, Sink};
pub use icon::{Icon, IconResolver};
pub use identity::{IdentityMap, ResourceId};
pub use service::ResolverService;
pub use texture::{Realized, TextureCache, Upload};
pub use theme::IconTheme;
pub use worker::{Resolve, WorkerPool};

pub type IconService = ResolverService<IconResolver>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("resource {0} was never interned")]
    UnknownId(ResourceId),
    #[error("resource {0} was polled before being requested")]
    NotRequested(ResourceId),
    #[error("no resource ids left to allocate")]
    IdsExhausted,
    #[error("resolver has shut down")]
    ShutDown,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

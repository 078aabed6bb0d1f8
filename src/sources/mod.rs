pub mod soundcloud;

use async_trait::async_trait;

use crate::error::ResolveError;

pub use soundcloud::SoundCloudResolver;

/// Metadata de una pista resuelta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub locator: String,
    pub title: String,
}

/// Playlist / set resuelto, en orden
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCollection {
    pub title: String,
    pub tracks: Vec<ResolvedTrack>,
}

/// Track Resolver contract.
///
/// Turns a user reference into playable locators and titles, and opens the
/// audio stream for a locator when its turn comes. `Stream` is whatever the
/// matching [`PlaybackSession`](crate::audio::session::PlaybackSession)
/// consumes.
#[async_trait]
pub trait TrackResolver: Send + Sync + 'static {
    type Stream: Send + 'static;

    /// Verifica si la referencia es válida para esta fuente
    fn is_supported(&self, reference: &str) -> bool;

    /// Whether the reference names a collection rather than a single track.
    fn is_collection(&self, reference: &str) -> bool;

    async fn resolve_single(&self, reference: &str) -> Result<ResolvedTrack, ResolveError>;

    /// Fails with [`ResolveError::EmptyCollection`] when nothing is playable.
    async fn resolve_collection(&self, reference: &str)
        -> Result<ResolvedCollection, ResolveError>;

    async fn open_stream(&self, locator: &str) -> Result<Self::Stream, ResolveError>;

    /// Nombre de la fuente
    fn source_name(&self) -> &'static str;
}

use std::fmt;

use async_trait::async_trait;

use crate::spotify::playlist::PlaylistSummary;
use crate::spotify::track::LikedItem;

pub mod api;
#[cfg(test)]
pub mod fake;
pub mod playlist;
pub mod track;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyError {
    /// Missing, expired or rejected access token (HTTP 401/403).
    Authentication,
    /// Network failure or non-success HTTP status.
    Transport,
    /// Body that could not be decoded into the expected shape.
    UnexpectedResponse,
    /// Request rejected before it was sent.
    InvalidRequest,
}

impl fmt::Display for SpotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpotifyError::Authentication => f.write_str("Spotify authentication error"),
            SpotifyError::Transport => f.write_str("Spotify transport error"),
            SpotifyError::UnexpectedResponse => f.write_str("Spotify unexpected response"),
            SpotifyError::InvalidRequest => f.write_str("Spotify invalid request"),
        }
    }
}

impl std::error::Error for SpotifyError {}

pub type SpotifyResult<T> = error_stack::Result<T, SpotifyError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    First { limit: u32 },
    /// Opaque `next` link handed back by the previous page.
    Next(String),
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

/// The slice of the Spotify Web API the sync job needs.
///
/// Every call is a single request; paging is driven by the caller through
/// [`PageCursor`]. Implemented by [`api::SpotifyApi`] and by an in-memory
/// double in tests.
#[async_trait]
pub trait MusicLibrary: Send + Sync {
    async fn current_user(&self) -> SpotifyResult<UserProfile>;

    /// Saved tracks, most recently liked first.
    async fn liked_tracks_page(&self, cursor: &PageCursor) -> SpotifyResult<Page<LikedItem>>;

    /// Playlists in the current user's library, followed ones included.
    /// Check [`PlaylistSummary::owner_id`] before writing to one.
    async fn playlists_page(&self, cursor: &PageCursor) -> SpotifyResult<Page<PlaylistSummary>>;

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> SpotifyResult<PlaylistSummary>;

    /// Track ids of a playlist's entries; `None` for entries without a track.
    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        cursor: &PageCursor,
    ) -> SpotifyResult<Page<Option<String>>>;

    /// Appends at most [`AppConfig::MAX_TRACKS_PER_REQUEST`](crate::config::AppConfig) tracks.
    async fn append_tracks(&self, playlist_id: &str, track_ids: &[String]) -> SpotifyResult<()>;
}

use async_trait::async_trait;
use error_stack::{IntoReport, Report, ResultExt};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::spotify::playlist::PlaylistSummary;
use crate::spotify::track::{track_uri, LikedItem};
use crate::spotify::{
    MusicLibrary, Page, PageCursor, SpotifyError, SpotifyResult, UserProfile,
};

#[derive(Deserialize, Debug)]
struct ApiUser {
    id: String,
    display_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiTrack {
    id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SavedTrackItem {
    added_at: chrono::DateTime<chrono::Utc>,
    track: Option<ApiTrack>,
}

#[derive(Deserialize, Debug)]
struct PlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Deserialize, Debug)]
struct ApiOwner {
    id: String,
}

#[derive(Deserialize, Debug)]
struct ApiPlaylist {
    id: String,
    name: String,
    owner: ApiOwner,
}

impl From<ApiPlaylist> for PlaylistSummary {
    fn from(playlist: ApiPlaylist) -> Self {
        PlaylistSummary::new(playlist.id, playlist.name, playlist.owner.id)
    }
}

#[derive(Deserialize, Debug)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Serialize, Debug)]
struct CreatePlaylistBody<'a> {
    name: &'a str,
    public: bool,
}

#[derive(Serialize, Debug)]
struct AddItemsBody {
    uris: Vec<String>,
}

/// Spotify Web API client authorized with a user access token.
pub struct SpotifyApi {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl SpotifyApi {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, AppConfig::SPOTIFY_API_BASE_URL.to_string())
    }

    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds the GET for a page: the first page from `path` and `query`,
    /// later pages straight from the `next` link.
    fn page_request(
        &self,
        path: &str,
        query: &[(&str, String)],
        cursor: &PageCursor,
    ) -> RequestBuilder {
        match cursor {
            PageCursor::First { limit } => self
                .client
                .get(self.endpoint(path))
                .query(query)
                .query(&[("limit", limit.to_string())]),
            PageCursor::Next(next_url) => self.client.get(next_url),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> SpotifyResult<T> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .into_report()
            .change_context(SpotifyError::Transport)?;
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let context = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SpotifyError::Authentication,
                _ => SpotifyError::Transport,
            };
            return Err(Report::new(context)
                .attach_printable(format!("{} returned {}", url, status))
                .attach_printable(body));
        }
        response
            .json::<T>()
            .await
            .into_report()
            .change_context(SpotifyError::UnexpectedResponse)
            .attach_printable_lazy(|| format!("Failed to decode response from {}", url))
    }

    fn next_cursor(next: Option<String>) -> Option<PageCursor> {
        next.map(PageCursor::Next)
    }
}

#[async_trait]
impl MusicLibrary for SpotifyApi {
    async fn current_user(&self) -> SpotifyResult<UserProfile> {
        let user: ApiUser = self
            .send_json(self.client.get(self.endpoint("/me")))
            .await?;
        Ok(UserProfile {
            id: user.id,
            display_name: user.display_name,
        })
    }

    async fn liked_tracks_page(&self, cursor: &PageCursor) -> SpotifyResult<Page<LikedItem>> {
        let paging: Paging<SavedTrackItem> = self
            .send_json(self.page_request("/me/tracks", &[], cursor))
            .await?;
        let mut items = Vec::with_capacity(paging.items.len());
        for item in paging.items {
            match item.track.and_then(|track| track.id) {
                Some(track_id) => items.push(LikedItem::new(track_id, item.added_at)),
                None => log::debug!(
                    "Skipping saved item from {} without a track id (it might be a local file)",
                    item.added_at
                ),
            }
        }
        Ok(Page {
            items,
            next: Self::next_cursor(paging.next),
        })
    }

    async fn playlists_page(&self, cursor: &PageCursor) -> SpotifyResult<Page<PlaylistSummary>> {
        let paging: Paging<Option<ApiPlaylist>> = self
            .send_json(self.page_request("/me/playlists", &[], cursor))
            .await?;
        let items = paging
            .items
            .into_iter()
            .flatten()
            .map(PlaylistSummary::from)
            .collect();
        Ok(Page {
            items,
            next: Self::next_cursor(paging.next),
        })
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> SpotifyResult<PlaylistSummary> {
        let request = self
            .client
            .post(self.endpoint(&format!("/users/{}/playlists", owner_id)))
            .json(&CreatePlaylistBody { name, public });
        let playlist: ApiPlaylist = self.send_json(request).await?;
        Ok(playlist.into())
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        cursor: &PageCursor,
    ) -> SpotifyResult<Page<Option<String>>> {
        let query = [
            ("fields", "items.track.id,next".to_string()),
            ("additional_types", "track".to_string()),
        ];
        let paging: Paging<PlaylistItem> = self
            .send_json(self.page_request(
                &format!("/playlists/{}/tracks", playlist_id),
                &query,
                cursor,
            ))
            .await?;
        let items = paging
            .items
            .into_iter()
            .map(|item| item.track.and_then(|track| track.id))
            .collect();
        Ok(Page {
            items,
            next: Self::next_cursor(paging.next),
        })
    }

    async fn append_tracks(&self, playlist_id: &str, track_ids: &[String]) -> SpotifyResult<()> {
        if track_ids.len() > AppConfig::MAX_TRACKS_PER_REQUEST {
            return Err(Report::new(SpotifyError::InvalidRequest).attach_printable(format!(
                "Cannot add {} tracks in one request, the limit is {}",
                track_ids.len(),
                AppConfig::MAX_TRACKS_PER_REQUEST
            )));
        }
        let body = AddItemsBody {
            uris: track_ids.iter().map(|id| track_uri(id)).collect(),
        };
        let request = self
            .client
            .post(self.endpoint(&format!("/playlists/{}/tracks", playlist_id)))
            .json(&body);
        let _snapshot: serde_json::Value = self.send_json(request).await?;
        Ok(())
    }
}

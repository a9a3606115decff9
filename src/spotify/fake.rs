//! In-memory [`MusicLibrary`] used by the sync tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::Report;

use crate::spotify::playlist::PlaylistSummary;
use crate::spotify::track::LikedItem;
use crate::spotify::{MusicLibrary, Page, PageCursor, SpotifyError, SpotifyResult, UserProfile};

#[derive(Debug, Default)]
struct State {
    liked: Vec<LikedItem>,
    playlists: Vec<(PlaylistSummary, Vec<Option<String>>)>,
    liked_pages_requested: usize,
    created: Vec<String>,
    append_calls: Vec<(String, Vec<String>)>,
    fail_append_call: Option<usize>,
    playlist_pages_requested: usize,
    fail_liked_page: Option<usize>,
    fail_playlists_page: Option<usize>,
}

impl State {
    fn take_failure(slot: &mut Option<usize>, request: usize, what: &str) -> SpotifyResult<()> {
        if *slot == Some(request) {
            *slot = None;
            return Err(Report::new(SpotifyError::Transport)
                .attach_printable(format!("503 injected on {} page {}", what, request)));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeLibrary {
    user_id: String,
    state: Mutex<State>,
}

impl FakeLibrary {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Liked items, newest first as Spotify returns them.
    pub fn with_liked(self, liked: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().liked = liked
            .iter()
            .map(|(id, added_at)| LikedItem::new(id.to_string(), timestamp(added_at)))
            .collect();
        self
    }

    pub fn with_playlist(self, id: &str, name: &str, tracks: &[Option<&str>]) -> Self {
        let owner = self.user_id.clone();
        self.with_followed_playlist(id, name, &owner, tracks)
    }

    /// A playlist in the user's library that `owner` owns.
    pub fn with_followed_playlist(
        self,
        id: &str,
        name: &str,
        owner: &str,
        tracks: &[Option<&str>],
    ) -> Self {
        self.state.lock().unwrap().playlists.push((
            PlaylistSummary::new(id.to_string(), name.to_string(), owner.to_string()),
            tracks.iter().map(|t| t.map(str::to_string)).collect(),
        ));
        self
    }

    /// Makes the `page`-th liked tracks request (1-based) fail once.
    pub fn fail_liked_page(&self, page: usize) {
        self.state.lock().unwrap().fail_liked_page = Some(page);
    }

    /// Makes the `page`-th playlist listing request (1-based, counted across
    /// lookups) fail once.
    pub fn fail_playlists_page(&self, page: usize) {
        self.state.lock().unwrap().fail_playlists_page = Some(page);
    }

    /// Makes the `call`-th append (1-based, counted across playlists) fail once.
    pub fn fail_append_call(&self, call: usize) {
        self.state.lock().unwrap().fail_append_call = Some(call);
    }

    pub fn liked_pages_requested(&self) -> usize {
        self.state.lock().unwrap().liked_pages_requested
    }

    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn append_calls(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().append_calls.clone()
    }

    pub fn append_sizes(&self) -> Vec<usize> {
        self.append_calls()
            .iter()
            .map(|(_, tracks)| tracks.len())
            .collect()
    }

    pub fn playlist_tracks(&self, name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|(playlist, _)| playlist.name == name)
            .map(|(_, tracks)| tracks.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn playlist_count(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .filter(|(playlist, _)| playlist.name == name)
            .count()
    }
}

pub fn timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

fn paginate<T: Clone>(all: &[T], cursor: &PageCursor, default_limit: usize) -> Page<T> {
    let (offset, limit) = match cursor {
        PageCursor::First { limit } => (0, *limit as usize),
        PageCursor::Next(next) => {
            let (offset, limit) = next.split_once(':').unwrap();
            (offset.parse().unwrap(), limit.parse().unwrap())
        }
    };
    let limit = if limit == 0 { default_limit } else { limit };
    let end = (offset + limit).min(all.len());
    let items = all[offset.min(all.len())..end].to_vec();
    let next = (end < all.len()).then(|| PageCursor::Next(format!("{}:{}", end, limit)));
    Page { items, next }
}

#[async_trait]
impl MusicLibrary for FakeLibrary {
    async fn current_user(&self) -> SpotifyResult<UserProfile> {
        Ok(UserProfile {
            id: self.user_id.clone(),
            display_name: None,
        })
    }

    async fn liked_tracks_page(&self, cursor: &PageCursor) -> SpotifyResult<Page<LikedItem>> {
        let mut state = self.state.lock().unwrap();
        state.liked_pages_requested += 1;
        let request = state.liked_pages_requested;
        State::take_failure(&mut state.fail_liked_page, request, "liked tracks")?;
        Ok(paginate(&state.liked, cursor, 50))
    }

    async fn playlists_page(&self, cursor: &PageCursor) -> SpotifyResult<Page<PlaylistSummary>> {
        let mut state = self.state.lock().unwrap();
        state.playlist_pages_requested += 1;
        let request = state.playlist_pages_requested;
        State::take_failure(&mut state.fail_playlists_page, request, "playlists")?;
        let summaries: Vec<PlaylistSummary> = state
            .playlists
            .iter()
            .map(|(playlist, _)| playlist.clone())
            .collect();
        Ok(paginate(&summaries, cursor, 50))
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> SpotifyResult<PlaylistSummary> {
        assert_eq!(owner_id, self.user_id);
        assert!(!public);
        let mut state = self.state.lock().unwrap();
        let playlist = PlaylistSummary::new(
            format!("created-{}", state.created.len() + 1),
            name.to_string(),
            owner_id.to_string(),
        );
        state.created.push(name.to_string());
        state.playlists.push((playlist.clone(), Vec::new()));
        Ok(playlist)
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        cursor: &PageCursor,
    ) -> SpotifyResult<Page<Option<String>>> {
        let state = self.state.lock().unwrap();
        let (_, tracks) = state
            .playlists
            .iter()
            .find(|(playlist, _)| playlist.id == playlist_id)
            .ok_or_else(|| {
                Report::new(SpotifyError::Transport).attach_printable("404 playlist not found")
            })?;
        Ok(paginate(tracks, cursor, 100))
    }

    async fn append_tracks(&self, playlist_id: &str, track_ids: &[String]) -> SpotifyResult<()> {
        assert!(track_ids.len() <= 100);
        let mut state = self.state.lock().unwrap();
        let call = state.append_calls.len() + 1;
        if state.fail_append_call == Some(call) {
            state.fail_append_call = None;
            return Err(Report::new(SpotifyError::Transport).attach_printable("503 injected"));
        }
        state
            .append_calls
            .push((playlist_id.to_string(), track_ids.to_vec()));
        let (_, tracks) = state
            .playlists
            .iter_mut()
            .find(|(playlist, _)| playlist.id == playlist_id)
            .ok_or_else(|| {
                Report::new(SpotifyError::Transport).attach_printable("404 playlist not found")
            })?;
        tracks.extend(track_ids.iter().cloned().map(Some));
        Ok(())
    }
}

use std::collections::HashSet;

use colored::Colorize;
use error_stack::ResultExt;

use crate::config::AppConfig;
use crate::spotify::playlist::PlaylistSummary;
use crate::spotify::{MusicLibrary, PageCursor};
use crate::sync::{SyncError, SyncResult};

/// Where a period's tracks go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Existing(PlaylistSummary),
    Created(PlaylistSummary),
    /// Dry run: the playlist is missing and would be created.
    Missing(String),
}

impl Destination {
    pub fn id(&self) -> Option<&str> {
        match self {
            Destination::Existing(playlist) | Destination::Created(playlist) => {
                Some(playlist.id.as_str())
            }
            Destination::Missing(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Destination::Existing(playlist) | Destination::Created(playlist) => {
                playlist.name.as_str()
            }
            Destination::Missing(name) => name.as_str(),
        }
    }

    pub fn is_new(&self) -> bool {
        !matches!(self, Destination::Existing(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub destination: Destination,
    /// Track ids handed in for the period.
    pub candidates: usize,
    /// Tracks already in the playlist before this run.
    pub existing: usize,
    /// Tracks appended (or that would be, on a dry run).
    pub added: usize,
}

/// Brings one playlist per period up to date with the liked tracks of that
/// period. Only ever appends; membership is re-read from Spotify every time.
pub struct Reconciler<'a> {
    library: &'a dyn MusicLibrary,
    owner_id: String,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(library: &'a dyn MusicLibrary, owner_id: String, dry_run: bool) -> Self {
        Self {
            library,
            owner_id,
            dry_run,
        }
    }

    pub async fn reconcile(
        &self,
        destination_name: &str,
        track_ids: &[String],
    ) -> SyncResult<ReconcileOutcome> {
        let destination = self.resolve_destination(destination_name).await?;
        let membership = match destination.id() {
            Some(playlist_id) => self.load_membership(playlist_id).await?,
            None => HashSet::new(),
        };
        println!(
            "Found {} existing tracks in playlist '{}'.",
            membership.len().to_string().cyan(),
            destination.name()
        );

        let new_tracks = diff_new_tracks(track_ids, &membership);
        println!("{}", self.append_message(new_tracks.len(), destination.name()));
        match destination.id() {
            Some(playlist_id) if !self.dry_run => {
                self.append_in_chunks(playlist_id, destination.name(), &new_tracks)
                    .await?
            }
            _ => {}
        }

        Ok(ReconcileOutcome {
            candidates: track_ids.len(),
            existing: membership.len(),
            added: new_tracks.len(),
            destination,
        })
    }

    fn append_message(&self, count: usize, playlist_name: &str) -> String {
        let verb = if self.dry_run { "Would add" } else { "Adding" };
        format!(
            "{} {} new tracks to playlist '{}'.",
            verb,
            count.to_string().green(),
            playlist_name
        )
    }

    /// First playlist the user owns with exactly this name, in listing order;
    /// created private when there is none.
    pub async fn resolve_destination(&self, name: &str) -> SyncResult<Destination> {
        if let Some(playlist) = self.find_playlist(name).await? {
            println!("Found existing playlist: {}", name.yellow());
            return Ok(Destination::Existing(playlist));
        }
        if self.dry_run {
            println!("Would create new playlist: {}", name.yellow());
            return Ok(Destination::Missing(name.to_string()));
        }
        println!("Creating new playlist: {}", name.yellow());
        let playlist = self
            .library
            .create_playlist(&self.owner_id, name, false)
            .await
            .change_context(SyncError)
            .attach_printable_lazy(|| format!("Failed to create playlist {}", name))?;
        log::info!("Created {}", playlist.get_playlist_url());
        Ok(Destination::Created(playlist))
    }

    async fn find_playlist(&self, name: &str) -> SyncResult<Option<PlaylistSummary>> {
        let mut cursor = Some(PageCursor::First {
            limit: AppConfig::PAGE_SIZE,
        });
        while let Some(current) = cursor.take() {
            let page = self
                .library
                .playlists_page(&current)
                .await
                .change_context(SyncError)
                .attach_printable("Failed to list the user's playlists")?;
            if let Some(playlist) = page
                .items
                .into_iter()
                .find(|p| p.name == name && p.owner_id == self.owner_id)
            {
                return Ok(Some(playlist));
            }
            cursor = page.next;
        }
        Ok(None)
    }

    /// Ids of every track currently in the playlist. Entries without a track
    /// (local files, removed tracks) are skipped.
    pub async fn load_membership(&self, playlist_id: &str) -> SyncResult<HashSet<String>> {
        let mut membership = HashSet::new();
        let mut cursor = Some(PageCursor::First {
            limit: AppConfig::MAX_TRACKS_PER_REQUEST as u32,
        });
        while let Some(current) = cursor.take() {
            let page = self
                .library
                .playlist_tracks_page(playlist_id, &current)
                .await
                .change_context(SyncError)
                .attach_printable_lazy(|| {
                    format!("Failed to list the tracks of playlist {}", playlist_id)
                })?;
            membership.extend(page.items.into_iter().flatten());
            cursor = page.next;
        }
        Ok(membership)
    }

    /// Appends in order, at most one request's worth at a time. A failed
    /// chunk stops the rest; earlier chunks stay applied.
    pub async fn append_in_chunks(
        &self,
        playlist_id: &str,
        playlist_name: &str,
        track_ids: &[String],
    ) -> SyncResult<()> {
        for (index, chunk) in track_ids
            .chunks(AppConfig::MAX_TRACKS_PER_REQUEST)
            .enumerate()
        {
            let start = index * AppConfig::MAX_TRACKS_PER_REQUEST;
            self.library
                .append_tracks(playlist_id, chunk)
                .await
                .change_context(SyncError)
                .attach_printable_lazy(|| {
                    format!(
                        "Failed to add tracks {} to {} to playlist '{}'",
                        start,
                        start + chunk.len(),
                        playlist_name
                    )
                })?;
            println!(
                "Added tracks {} to {} to playlist '{}'.",
                start,
                start + chunk.len(),
                playlist_name
            );
        }
        Ok(())
    }
}

/// Candidates missing from `membership`, in candidate order. Repeats of the
/// same id are dropped so a track is never added twice in one run.
pub fn diff_new_tracks(track_ids: &[String], membership: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut new_tracks = Vec::new();
    for track_id in track_ids {
        if !membership.contains(track_id) && seen.insert(track_id.as_str()) {
            new_tracks.push(track_id.clone());
        }
    }
    new_tracks
}

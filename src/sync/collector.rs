use std::time::Duration;

use colored::Colorize;
use error_stack::ResultExt;
use indicatif::ProgressBar;

use crate::config::AppConfig;
use crate::spotify::track::LikedItem;
use crate::spotify::{MusicLibrary, PageCursor};
use crate::sync::cutoff::{Cutoff, CutoffPolicy};
use crate::sync::{SyncError, SyncResult};

pub struct LikedTracksCollector<'a> {
    library: &'a dyn MusicLibrary,
    cutoff: Option<Cutoff>,
    policy: CutoffPolicy,
}

impl<'a> LikedTracksCollector<'a> {
    pub fn new(library: &'a dyn MusicLibrary, cutoff: Option<Cutoff>, policy: CutoffPolicy) -> Self {
        Self {
            library,
            cutoff,
            policy,
        }
    }

    /// Pages through the liked tracks, newest first, until the feed ends or
    /// the cutoff is reached.
    ///
    /// The first item liked at or before the cutoff ends collection: it and
    /// everything after it on that page are dropped. Whether later pages are
    /// still requested depends on the [`CutoffPolicy`].
    pub async fn fetch_liked_items(&self) -> SyncResult<Vec<LikedItem>> {
        println!("{}", "Fetching liked tracks...".cyan());
        let spinner = ProgressBar::new_spinner();
        spinner.enable_steady_tick(Duration::from_millis(120));

        let mut tracks = Vec::new();
        let mut cursor = Some(PageCursor::First {
            limit: AppConfig::PAGE_SIZE,
        });
        while let Some(current) = cursor.take() {
            let page = self
                .library
                .liked_tracks_page(&current)
                .await
                .change_context(SyncError)
                .attach_printable("Failed to fetch a page of liked tracks")?;
            spinner.println(format!("Fetched {} tracks in this batch.", page.items.len()));

            let mut reached_cutoff = false;
            for item in page.items {
                if let Some(cutoff) = &self.cutoff {
                    if !cutoff.admits(&item.added_at) {
                        reached_cutoff = true;
                        break;
                    }
                }
                tracks.push(item);
            }
            spinner.set_message(format!("{} liked tracks fetched", tracks.len()));

            if reached_cutoff && self.policy == CutoffPolicy::StopPaging {
                log::debug!("Reached the cutoff, not requesting more pages");
                break;
            }
            cursor = page.next;
        }
        spinner.finish_and_clear();

        println!(
            "Total liked tracks fetched: {}",
            tracks.len().to_string().green()
        );
        Ok(tracks)
    }
}

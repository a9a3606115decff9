use clap::Args;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Table};
use error_stack::ResultExt;

use crate::auth::spotify_auth::SpotifyAuth;
use crate::config::SyncConfig;
use crate::spotify::api::SpotifyApi;
use crate::spotify::MusicLibrary;
use crate::sync::collector::LikedTracksCollector;
use crate::sync::cutoff::CutoffPolicy;
use crate::sync::grouper::group_by_period;
use crate::sync::reconciler::{ReconcileOutcome, Reconciler};
use crate::sync::{SyncError, SyncResult};

#[derive(Args, Debug, PartialEq, Eq, Clone, Default)]
pub struct SyncCli {
    /// Only sync tracks liked after this date, e.g. 2024-01-10 or 2024-01-10T00:00:00Z.
    /// Overrides MIN_ADDED_DATE
    #[arg(long)]
    pub min_added_date: Option<String>,
    /// Playlist name prefix, the month is appended. Overrides PLAYLIST_PREFIX
    #[arg(long)]
    pub prefix: Option<String>,
    /// Show what would be added without touching any playlist
    #[arg(long, action)]
    pub dry_run: bool,
    /// Keep paging through liked tracks after the cutoff instead of stopping
    #[arg(long, action)]
    pub scan_all_pages: bool,
}

impl SyncCli {
    pub fn apply(&self, config: &mut SyncConfig) -> SyncResult<()> {
        if let Some(value) = &self.min_added_date {
            config.min_added_at =
                Some(SyncConfig::parse_cutoff(value).change_context(SyncError)?);
        }
        if let Some(prefix) = &self.prefix {
            config.playlist_prefix = prefix.clone();
        }
        Ok(())
    }

    pub fn cutoff_policy(&self) -> CutoffPolicy {
        if self.scan_all_pages {
            CutoffPolicy::ScanAllPages
        } else {
            CutoffPolicy::StopPaging
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub liked: usize,
    pub outcomes: Vec<ReconcileOutcome>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn total_added(&self) -> usize {
        self.outcomes.iter().map(|outcome| outcome.added).sum()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_header(vec![
            "Playlist",
            "Liked",
            "Already there",
            "Added",
            "New playlist",
        ]);
        for outcome in &self.outcomes {
            table.add_row(vec![
                Cell::new(outcome.destination.name()),
                Cell::new(outcome.candidates),
                Cell::new(outcome.existing),
                Cell::new(outcome.added),
                Cell::new(if outcome.destination.is_new() { "yes" } else { "" }),
            ]);
        }
        table
    }

    pub fn print(&self) {
        if self.outcomes.is_empty() {
            println!("{}", "No liked tracks to sync.".yellow());
            return;
        }
        println!("{}", self.to_table());
        let verb = if self.dry_run { "would be added" } else { "added" };
        println!(
            "{} of {} liked tracks {} across {} playlists.",
            self.total_added().to_string().green(),
            self.liked,
            verb,
            self.outcomes.len().to_string().cyan()
        );
    }
}

pub struct SyncCommands;

impl SyncCommands {
    pub async fn execute(cli: SyncCli) -> SyncResult<()> {
        let mut config = SyncConfig::from_env().change_context(SyncError)?;
        cli.apply(&mut config)?;

        let auth = SpotifyAuth::new(&config).change_context(SyncError)?;
        let token = auth.authorized_token().await.change_context(SyncError)?;
        let api = SpotifyApi::new(token.access_token);

        let report = Self::run(&api, &config, cli.cutoff_policy(), cli.dry_run).await?;
        report.print();
        println!("{}", "Sync completed.".green());
        Ok(())
    }

    /// Collects, groups and reconciles, one month at a time. Stops at the
    /// first failure; months already done stay done.
    pub async fn run(
        library: &dyn MusicLibrary,
        config: &SyncConfig,
        policy: CutoffPolicy,
        dry_run: bool,
    ) -> SyncResult<SyncReport> {
        let user = library
            .current_user()
            .await
            .change_context(SyncError)
            .attach_printable("Failed to fetch the current user")?;
        println!(
            "Authenticated as user: {}",
            user.display_name.as_deref().unwrap_or(&user.id).green()
        );

        let liked = LikedTracksCollector::new(library, config.min_added_at, policy)
            .fetch_liked_items()
            .await?;
        let groups = group_by_period(&liked);
        println!("Grouped tracks into {} months.", groups.len().to_string().cyan());

        let reconciler = Reconciler::new(library, user.id, dry_run);
        let mut report = SyncReport {
            liked: liked.len(),
            outcomes: Vec::with_capacity(groups.len()),
            dry_run,
        };
        for group in groups {
            println!(
                "Processing month: {} with {} tracks.",
                group.period.to_string().cyan(),
                group.track_ids.len()
            );
            let playlist_name = config.playlist_name(group.period.as_str());
            let outcome = reconciler
                .reconcile(&playlist_name, &group.track_ids)
                .await
                .attach_printable_lazy(|| format!("While syncing {}", group.period))?;
            report.outcomes.push(outcome);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use crate::spotify::fake::FakeLibrary;

    use super::*;

    fn liked_feed() -> FakeLibrary {
        FakeLibrary::new("user")
            .with_liked(&[
                ("id4", "2024-02-03T09:00:00Z"),
                ("id3", "2024-02-01T00:00:00Z"),
                ("id2", "2024-01-20T00:00:00Z"),
                ("id1", "2024-01-15T10:00:00Z"),
                ("id0", "2023-12-24T18:30:00Z"),
            ])
            .with_playlist("jan", "Liked Songs 2024-01", &[Some("id1")])
    }

    #[tokio::test]
    async fn test_run_files_tracks_by_month() {
        let library = liked_feed();
        let config = SyncConfig::default();
        let report = SyncCommands::run(&library, &config, CutoffPolicy::StopPaging, false)
            .await
            .unwrap();

        let names: Vec<&str> = report
            .outcomes
            .iter()
            .map(|outcome| outcome.destination.name())
            .collect();
        assert_eq!(
            names,
            vec!["Liked Songs 2024-02", "Liked Songs 2024-01", "Liked Songs 2023-12"]
        );
        assert_eq!(report.liked, 5);
        assert_eq!(report.total_added(), 4);
        assert_eq!(library.playlist_tracks("Liked Songs 2024-02"), vec!["id4", "id3"]);
        assert_eq!(library.playlist_tracks("Liked Songs 2024-01"), vec!["id1", "id2"]);
        assert_eq!(library.playlist_tracks("Liked Songs 2023-12"), vec!["id0"]);
        assert_eq!(
            library.created(),
            vec!["Liked Songs 2024-02", "Liked Songs 2023-12"]
        );

        let again = SyncCommands::run(&library, &config, CutoffPolicy::StopPaging, false)
            .await
            .unwrap();
        assert_eq!(again.total_added(), 0);
        assert_eq!(library.created().len(), 2);
    }

    #[tokio::test]
    async fn test_run_honours_cutoff_and_prefix() {
        let library = liked_feed();
        let mut config = SyncConfig::default();
        let cli = SyncCli {
            min_added_date: Some("2024-01-16".to_string()),
            prefix: Some("Likes ".to_string()),
            ..SyncCli::default()
        };
        cli.apply(&mut config).unwrap();

        let report = SyncCommands::run(&library, &config, cli.cutoff_policy(), false)
            .await
            .unwrap();
        assert_eq!(report.liked, 3);
        assert_eq!(library.playlist_tracks("Likes 2024-02"), vec!["id4", "id3"]);
        assert_eq!(library.playlist_tracks("Likes 2024-01"), vec!["id2"]);
        assert_eq!(library.playlist_count("Likes 2023-12"), 0);
    }

    #[tokio::test]
    async fn test_run_dry_run_reports_without_writing() {
        let library = liked_feed();
        let report = SyncCommands::run(
            &library,
            &SyncConfig::default(),
            CutoffPolicy::StopPaging,
            true,
        )
        .await
        .unwrap();
        assert_eq!(report.total_added(), 4);
        assert!(library.created().is_empty());
        assert!(library.append_calls().is_empty());
        let table = report.to_table().to_string();
        assert!(table.contains("Liked Songs 2023-12"));
    }

    #[tokio::test]
    async fn test_run_stops_at_first_failing_month() {
        let library = liked_feed();
        library.fail_append_call(2);
        let result =
            SyncCommands::run(&library, &SyncConfig::default(), CutoffPolicy::StopPaging, false)
                .await;
        assert!(result.is_err());
        // February went through, January failed, December never started
        assert_eq!(library.playlist_tracks("Liked Songs 2024-02"), vec!["id4", "id3"]);
        assert_eq!(library.playlist_tracks("Liked Songs 2024-01"), vec!["id1"]);
        assert_eq!(library.playlist_count("Liked Songs 2023-12"), 0);
    }

    #[tokio::test]
    async fn test_run_fails_before_writing_when_liked_page_fails() {
        let mut liked = Vec::new();
        for i in 0..60 {
            liked.push((format!("id{}", i), format!("2024-01-{:02}T00:00:00Z", 31 - i / 2)));
        }
        let entries: Vec<(&str, &str)> = liked
            .iter()
            .map(|(id, added_at)| (id.as_str(), added_at.as_str()))
            .collect();
        let library = FakeLibrary::new("user").with_liked(&entries);
        library.fail_liked_page(2);

        let result =
            SyncCommands::run(&library, &SyncConfig::default(), CutoffPolicy::StopPaging, false)
                .await;
        assert!(result.is_err());
        assert_eq!(library.liked_pages_requested(), 2);
        assert!(library.created().is_empty());
        assert!(library.append_calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_listing_playlists_fails_mid_run() {
        let library = liked_feed();
        // February takes one listing request, January's lookup is the second
        library.fail_playlists_page(2);
        let result =
            SyncCommands::run(&library, &SyncConfig::default(), CutoffPolicy::StopPaging, false)
                .await;
        assert!(result.is_err());
        assert_eq!(library.playlist_tracks("Liked Songs 2024-02"), vec!["id4", "id3"]);
        assert_eq!(library.playlist_tracks("Liked Songs 2024-01"), vec!["id1"]);
        assert_eq!(library.created(), vec!["Liked Songs 2024-02"]);
        assert_eq!(library.append_calls().len(), 1);
    }

    #[test]
    fn test_apply_rejects_bad_date() {
        let mut config = SyncConfig::default();
        let cli = SyncCli {
            min_added_date: Some("yesterday".to_string()),
            ..SyncCli::default()
        };
        assert!(cli.apply(&mut config).is_err());
        assert!(config.min_added_at.is_none());
    }
}

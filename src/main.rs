use std::fmt;

use clap::{Parser, Subcommand};
use colored::Colorize;
use error_stack::fmt::{Charset, ColorMode};
use error_stack::{FutureExt, Report, ResultExt};

use crate::auth::spotify_auth::SpotifyAuth;
use crate::config::SyncConfig;
use crate::sync::commands::{SyncCli, SyncCommands};

mod auth;
mod config;
mod spotify;
mod sync;

#[derive(Debug)]
pub struct LikedMonthlyError;
impl fmt::Display for LikedMonthlyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Liked monthly error")
    }
}
impl std::error::Error for LikedMonthlyError {}

pub type LikedMonthlyResult<T> = error_stack::Result<T, LikedMonthlyError>;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Files your Spotify liked songs into monthly playlists")]
struct Cli {
    #[command(subcommand)]
    command: LikedMonthlyCommands,
}

#[derive(Subcommand, Debug, PartialEq, Eq, Clone)]
pub enum LikedMonthlyCommands {
    /// Log in to Spotify and cache the token
    Auth,
    /// Print the configuration read from the environment
    Config,
    /// Add liked tracks to their month's playlist, creating playlists as needed
    Sync(SyncCli),
}

impl LikedMonthlyCommands {
    pub async fn execute(&self) -> LikedMonthlyResult<()> {
        match self {
            LikedMonthlyCommands::Auth => {
                let config = SyncConfig::from_env().change_context(LikedMonthlyError)?;
                let auth = SpotifyAuth::new(&config).change_context(LikedMonthlyError)?;
                auth.login().change_context(LikedMonthlyError).await?;
                Ok(())
            }
            LikedMonthlyCommands::Config => {
                let config = SyncConfig::from_env().change_context(LikedMonthlyError)?;
                println!("Current config:");
                config.print();
                Ok(())
            }
            LikedMonthlyCommands::Sync(cli) => {
                println!("{}", "Starting sync...".cyan());
                SyncCommands::execute(cli.clone())
                    .change_context(LikedMonthlyError)
                    .await
            }
        }
    }

    pub fn cli_command(&self) -> String {
        match self {
            LikedMonthlyCommands::Auth => "liked-monthly auth".to_string(),
            LikedMonthlyCommands::Config => "liked-monthly config".to_string(),
            LikedMonthlyCommands::Sync(cli) => {
                let mut cmd = "liked-monthly sync".to_string();
                if let Some(date) = &cli.min_added_date {
                    cmd.push_str(&format!(" --min-added-date {}", date));
                }
                if let Some(prefix) = &cli.prefix {
                    cmd.push_str(&format!(" --prefix {:?}", prefix));
                }
                if cli.dry_run {
                    cmd.push_str(" --dry-run");
                }
                if cli.scan_all_pages {
                    cmd.push_str(" --scan-all-pages");
                }
                cmd
            }
        }
    }
}

pub struct Suggestion(String);

impl Suggestion {
    pub fn set_report() {
        Report::set_charset(Charset::Utf8);
        Report::set_color_mode(ColorMode::Color);
        Report::install_debug_hook::<Self>(|Self(value), context| {
            context.push_body(format!("{}: {value}", "suggestion".yellow()))
        });
    }
}

async fn run() -> LikedMonthlyResult<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
    Suggestion::set_report();

    log::debug!("Running {}", cli.command.cli_command());
    cli.command.execute().await
}

#[tokio::main]
async fn main() -> LikedMonthlyResult<()> {
    run().await
}

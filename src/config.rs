use std::{env, fmt};

use colored::Colorize;
use dotenvy::dotenv;
use error_stack::{IntoReport, ResultExt};
use url::Url;

use crate::sync::cutoff::Cutoff;
use crate::Suggestion;

#[derive(Debug)]
pub struct ConfigError;

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Config error")
    }
}

impl std::error::Error for ConfigError {}

pub type ConfigResult<T> = error_stack::Result<T, ConfigError>;

/// `AppConfig` holds static configuration values for the application,
/// such as Spotify endpoints and API limits.
pub struct AppConfig;

impl AppConfig {
    pub const SPOTIFY_API_BASE_URL: &'static str = "https://api.spotify.com/v1";
    pub const SPOTIFY_AUTH_URL: &'static str = "https://accounts.spotify.com/authorize";
    pub const SPOTIFY_TOKEN_URL: &'static str = "https://accounts.spotify.com/api/token";
    pub const SPOTIFY_SCOPES: [&'static str; 4] = [
        "playlist-modify-public",
        "playlist-read-private",
        "playlist-modify-private",
        "user-library-read",
    ];
    pub const DEFAULT_REDIRECT_URI: &'static str = "http://127.0.0.1:8888/callback";
    pub const DEFAULT_PLAYLIST_PREFIX: &'static str = "Liked Songs ";
    /// Largest page the liked tracks and playlist listings accept.
    pub const PAGE_SIZE: u32 = 50;
    /// Largest batch the add-items endpoint accepts.
    pub const MAX_TRACKS_PER_REQUEST: usize = 100;
    pub const OAUTH_CALLBACK_TIMEOUT_SECS: u64 = 300;
    /// Tokens this close to expiry are refreshed before use.
    pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;
    pub const TOKEN_DIR: &'static str = ".liked-monthly";
    pub const TOKEN_FILE: &'static str = "spotify_token.json";
}

/// Runtime settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub min_added_at: Option<Cutoff>,
    pub playlist_prefix: String,
}

impl SyncConfig {
    pub fn from_env() -> ConfigResult<Self> {
        dotenv().ok();
        let client_id = Self::var(&["SPOTIFY_CLIENT_ID", "SPOTIPY_CLIENT_ID"])
            .ok_or(ConfigError)
            .into_report()
            .attach_printable("SPOTIFY_CLIENT_ID environment variable not set. Please create a .env file with the credentials.")
            .attach(Suggestion(
                "add SPOTIFY_CLIENT_ID=<client id from the Spotify developer dashboard> to .env"
                    .to_string(),
            ))?;
        let client_secret = Self::var(&["SPOTIFY_CLIENT_SECRET", "SPOTIPY_CLIENT_SECRET"]);
        let redirect_uri = Self::var(&["SPOTIFY_REDIRECT_URI", "SPOTIPY_REDIRECT_URI"])
            .unwrap_or_else(|| AppConfig::DEFAULT_REDIRECT_URI.to_string());
        Url::parse(&redirect_uri)
            .into_report()
            .change_context(ConfigError)
            .attach_printable_lazy(|| format!("Invalid redirect uri: {}", redirect_uri))?;
        let min_added_at = match Self::var(&["MIN_ADDED_DATE"]) {
            Some(value) => Some(Self::parse_cutoff(&value)?),
            None => None,
        };
        let playlist_prefix = env::var("PLAYLIST_PREFIX")
            .unwrap_or_else(|_| AppConfig::DEFAULT_PLAYLIST_PREFIX.to_string());
        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            min_added_at,
            playlist_prefix,
        })
    }

    pub fn parse_cutoff(value: &str) -> ConfigResult<Cutoff> {
        value
            .parse::<Cutoff>()
            .change_context(ConfigError)
            .attach_printable_lazy(|| {
                format!(
                    "MIN_ADDED_DATE must be a date (2024-01-10) or an RFC 3339 timestamp, got {}",
                    value
                )
            })
    }

    pub fn playlist_name(&self, period: &str) -> String {
        format!("{}{}", self.playlist_prefix, period)
    }

    pub fn print(&self) {
        let secret = match self.client_secret {
            Some(_) => "********".to_string(),
            None => "(not set, PKCE only)".to_string(),
        };
        let cutoff = self
            .min_added_at
            .map(|cutoff| cutoff.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        println!("{}: {}", "client id".cyan(), self.client_id);
        println!("{}: {}", "client secret".cyan(), secret);
        println!("{}: {}", "redirect uri".cyan(), self.redirect_uri);
        println!("{}: {}", "min added date".cyan(), cutoff);
        println!(
            "{}: {}",
            "playlist name".cyan(),
            self.playlist_name("YYYY-MM").yellow()
        );
    }

    // empty values count as unset, same as a missing variable
    fn var(keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| env::var(key).ok())
            .find(|value| !value.trim().is_empty())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: AppConfig::DEFAULT_REDIRECT_URI.to_string(),
            min_added_at: None,
            playlist_prefix: AppConfig::DEFAULT_PLAYLIST_PREFIX.to_string(),
        }
    }
}

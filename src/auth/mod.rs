use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use error_stack::{IntoReport, ResultExt};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

pub mod spotify_auth;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// True once the token is within the expiry skew of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(AppConfig::TOKEN_EXPIRY_SKEW_SECS) <= now
    }

    pub fn get_token_path() -> AuthResult<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or(AuthError)
            .into_report()
            .attach_printable("Could not find the home directory")?;
        Ok(home_dir.join(AppConfig::TOKEN_DIR).join(AppConfig::TOKEN_FILE))
    }

    pub fn save(&self) -> AuthResult<()> {
        let token_path = Self::get_token_path()?;
        if let Some(folder) = token_path.parent() {
            std::fs::create_dir_all(folder)
                .into_report()
                .change_context(AuthError)?;
        }
        let token_json = serde_json::to_string_pretty(self)
            .into_report()
            .change_context(AuthError)?;
        std::fs::write(&token_path, token_json)
            .into_report()
            .change_context(AuthError)
            .attach_printable_lazy(|| format!("Failed to write {}", token_path.display()))?;
        log::debug!("Token saved to {}", token_path.display());
        Ok(())
    }

    /// The cached token, or `None` when nothing has been saved yet.
    pub fn load() -> AuthResult<Option<Self>> {
        let token_path = Self::get_token_path()?;
        if !token_path.is_file() {
            return Ok(None);
        }
        let token_json = std::fs::read_to_string(&token_path)
            .into_report()
            .change_context(AuthError)?;
        let token: Self = serde_json::from_str(&token_json)
            .into_report()
            .change_context(AuthError)
            .attach_printable_lazy(|| format!("Corrupt token cache at {}", token_path.display()))?;
        Ok(Some(token))
    }
}

#[derive(Debug)]
pub struct AuthError;

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Authentication error")
    }
}

impl std::error::Error for AuthError {}

pub type AuthResult<T> = error_stack::Result<T, AuthError>;

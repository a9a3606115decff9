use std::time::{Duration, Instant};

use chrono::Utc;
use colored::Colorize;
use error_stack::{IntoReport, Report, ResultExt};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use tiny_http::{Response, Server};
use url::Url;

use super::{AuthError, AuthResult, AuthToken};
use crate::config::{AppConfig, SyncConfig};
use crate::{LikedMonthlyCommands, Suggestion};

/// What came back on the redirect uri.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Code { code: String, state: String },
    Denied(String),
    /// Some other request hit the server (favicon and the like).
    Ignored,
}

impl Callback {
    pub fn parse(request_url: &str, redirect_path: &str) -> Self {
        let Ok(url) = Url::parse(&format!("http://localhost{}", request_url)) else {
            return Callback::Ignored;
        };
        if url.path() != redirect_path {
            return Callback::Ignored;
        }
        let mut code = None;
        let mut state = String::new();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = value.into_owned(),
                "error" => return Callback::Denied(value.into_owned()),
                _ => {}
            }
        }
        match code {
            Some(code) => Callback::Code { code, state },
            None => Callback::Ignored,
        }
    }
}

pub struct SpotifyAuth {
    client: BasicClient,
    redirect_uri: Url,
}

impl SpotifyAuth {
    pub fn new(config: &SyncConfig) -> AuthResult<Self> {
        let redirect_uri = Url::parse(&config.redirect_uri)
            .into_report()
            .change_context(AuthError)?;
        let mut client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(AppConfig::SPOTIFY_AUTH_URL.to_string())
                .into_report()
                .change_context(AuthError)?,
            Some(
                TokenUrl::new(AppConfig::SPOTIFY_TOKEN_URL.to_string())
                    .into_report()
                    .change_context(AuthError)?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_uri.to_string())
                .into_report()
                .change_context(AuthError)?,
        );
        // PKCE without a secret: Spotify wants the client id in the body
        if config.client_secret.is_none() {
            client = client.set_auth_type(AuthType::RequestBody);
        }
        Ok(Self {
            client,
            redirect_uri,
        })
    }

    /// A usable access token: the cached one, a refreshed one, or a fresh
    /// login when neither works.
    pub async fn authorized_token(&self) -> AuthResult<AuthToken> {
        let cached = AuthToken::load()?;
        match cached {
            Some(token) if !token.is_expired(Utc::now()) => {
                log::debug!("Using cached token, expires at {}", token.expires_at);
                Ok(token)
            }
            Some(AuthToken {
                refresh_token: Some(refresh_token),
                ..
            }) => match self.refresh(&refresh_token).await {
                Ok(token) => Ok(token),
                Err(report) => {
                    log::warn!("Token refresh failed, logging in again: {:?}", report);
                    self.login().await
                }
            },
            _ => self.login().await,
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthToken> {
        println!("{}", "Refreshing Spotify access token...".cyan());
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Report::new(AuthError).attach_printable(e.to_string()))?;
        // Spotify may omit the refresh token on refresh; keep the old one then
        let token = Self::token_from_response(&response, Some(refresh_token.to_string()));
        token.save()?;
        Ok(token)
    }

    pub async fn login(&self) -> AuthResult<AuthToken> {
        println!("{}", "Initiating Spotify authentication...".cyan());
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(
                AppConfig::SPOTIFY_SCOPES
                    .iter()
                    .map(|scope| Scope::new(scope.to_string())),
            )
            .set_pkce_challenge(pkce_challenge)
            .url();

        println!("Opening browser for authentication...");
        println!(
            "If browser doesn't open, visit: {}",
            auth_url.to_string().blue()
        );
        if webbrowser::open(auth_url.as_str()).is_err() {
            println!("{}", "Failed to open browser automatically".yellow());
        }

        let (code, returned_state) = self.wait_for_callback().await?;
        if returned_state != *csrf_token.secret() {
            return Err(Report::new(AuthError)
                .attach_printable("State mismatch in the authorization callback"));
        }

        println!("Exchanging authorization code for access token...");
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| Report::new(AuthError).attach_printable(e.to_string()))?;

        let token = Self::token_from_response(&response, None);
        token.save()?;
        println!("{}", "Successfully authenticated with Spotify!".green());
        Ok(token)
    }

    async fn wait_for_callback(&self) -> AuthResult<(String, String)> {
        let host = self.redirect_uri.host_str().unwrap_or("127.0.0.1");
        let port = self.redirect_uri.port_or_known_default().unwrap_or(8888);
        let address = format!("{}:{}", host, port);
        let server = Server::http(&address).map_err(|e| {
            Report::new(AuthError)
                .attach_printable(format!("Could not listen on {}: {}", address, e))
        })?;
        println!(
            "Waiting for authentication callback on {}",
            self.redirect_uri.as_str().cyan()
        );

        let timeout = Duration::from_secs(AppConfig::OAUTH_CALLBACK_TIMEOUT_SECS);
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                println!("{}", "Authentication timeout!".red());
                return Err(Report::new(AuthError)
                    .attach_printable("Timed out waiting for the authorization callback")
                    .attach(Suggestion(format!(
                        "run {} and finish the login in the browser",
                        LikedMonthlyCommands::Auth.cli_command()
                    ))));
            }
            let request = server
                .recv_timeout(Duration::from_millis(100))
                .into_report()
                .change_context(AuthError)?;
            let Some(request) = request else {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            };
            let callback = Callback::parse(request.url(), self.redirect_uri.path());
            log::debug!("Callback request {} parsed as {:?}", request.url(), callback);
            match callback {
                Callback::Code { code, state } => {
                    let response = Response::from_string(
                        "Authentication successful! You can close this tab and return to liked-monthly.",
                    );
                    if let Err(e) = request.respond(response) {
                        log::warn!("Could not answer the browser: {}", e);
                    }
                    return Ok((code, state));
                }
                Callback::Denied(reason) => {
                    let response = Response::from_string("Authentication was denied.")
                        .with_status_code(400);
                    if let Err(e) = request.respond(response) {
                        log::warn!("Could not answer the browser: {}", e);
                    }
                    return Err(Report::new(AuthError)
                        .attach_printable(format!("Spotify denied the authorization: {}", reason)));
                }
                Callback::Ignored => {
                    let response = Response::from_string("Not Found").with_status_code(404);
                    if let Err(e) = request.respond(response) {
                        log::warn!("Could not answer the browser: {}", e);
                    }
                }
            }
        }
    }

    fn token_from_response(
        response: &BasicTokenResponse,
        previous_refresh_token: Option<String>,
    ) -> AuthToken {
        let expires_in = response
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600);
        AuthToken {
            access_token: response.access_token().secret().to_string(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or(previous_refresh_token),
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }
}

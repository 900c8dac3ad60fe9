use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rspotify::{prelude::*, AuthCodeSpotify, Config, Credentials, OAuth};

use crate::config::SpotifySettings;
use crate::error::{Error, Result};
use crate::model::{PlaylistService, SpotifyClient};

pub const SCOPES: &str =
    "playlist-modify-public playlist-modify-private playlist-read-private user-read-recently-played";

/// Login state of the single user this proxy serves.
#[async_trait]
pub trait Session: Send + Sync {
    fn authorize_url(&self) -> Result<String>;

    /// Trade an authorization code for a token and cache it.
    async fn exchange_code(&self, code: &str) -> Result<()>;

    /// A client for the logged-in user, or `None` when nobody is logged in.
    async fn client(&self) -> Result<Option<Arc<dyn PlaylistService>>>;

    async fn logout(&self) -> Result<()>;
}

/// Authorization code flow with the token cached on disk
pub struct SpotifyAuth {
    credentials: Credentials,
    oauth: OAuth,
    token_cache: PathBuf,
}

impl SpotifyAuth {
    pub fn new(settings: &SpotifySettings, token_cache: PathBuf) -> Result<Self> {
        let (Some(id), Some(secret)) = (&settings.client_id, &settings.client_secret) else {
            return Err(Error::Config(
                "Spotify client_id and client_secret must be set".to_string(),
            ));
        };

        let oauth = OAuth {
            redirect_uri: settings.redirect_uri.clone(),
            scopes: SCOPES.split_whitespace().map(str::to_string).collect(),
            ..Default::default()
        };

        Ok(Self {
            credentials: Credentials::new(id, secret),
            oauth,
            token_cache,
        })
    }

    fn spotify(&self) -> AuthCodeSpotify {
        AuthCodeSpotify::with_config(
            self.credentials.clone(),
            self.oauth.clone(),
            Config {
                token_cached: true,
                token_refreshing: true,
                cache_path: self.token_cache.clone(),
                ..Default::default()
            },
        )
    }

    fn ensure_cache_dir(&self) -> Result<()> {
        if let Some(dir) = self.token_cache.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| Error::Auth(format!("cannot create token cache dir: {e}")))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Session for SpotifyAuth {
    fn authorize_url(&self) -> Result<String> {
        Ok(self.spotify().get_authorize_url(true)?)
    }

    async fn exchange_code(&self, code: &str) -> Result<()> {
        self.ensure_cache_dir()?;
        let spotify = self.spotify();
        spotify.request_token(code).await?;
        tracing::info!("Authorization code exchanged, token cached");
        Ok(())
    }

    async fn client(&self) -> Result<Option<Arc<dyn PlaylistService>>> {
        if !self.token_cache.exists() {
            tracing::debug!("No cached token");
            return Ok(None);
        }

        let spotify = self.spotify();
        let token = match spotify.read_token_cache(true).await {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable token cache, treating as logged out");
                return Ok(None);
            }
        };

        let expired = token.is_expired();
        *spotify
            .token
            .lock()
            .await
            .map_err(|_| Error::Auth("token lock poisoned".to_string()))? = Some(token);

        if expired {
            tracing::info!("Cached token expired, refreshing...");
            if let Err(e) = spotify.refresh_token().await {
                tracing::error!(error = %e, "Failed to refresh token");
                return Err(e.into());
            }
            tracing::info!("Token refreshed successfully");
        }

        Ok(Some(Arc::new(SpotifyClient::new(spotify))))
    }

    async fn logout(&self) -> Result<()> {
        match fs::remove_file(&self.token_cache) {
            Ok(()) => {
                tracing::info!("Token cache removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Auth(format!("cannot remove token cache: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> SpotifySettings {
        SpotifySettings {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            redirect_uri: "http://localhost:3000/callback".to_string(),
        }
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let mut settings = settings();
        settings.client_secret = None;
        let result = SpotifyAuth::new(&settings, PathBuf::from(".spotify_cache"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn authorize_url_carries_client_and_scopes() {
        let auth = SpotifyAuth::new(&settings(), PathBuf::from(".spotify_cache")).unwrap();
        let url = auth.authorize_url().unwrap();
        assert!(url.starts_with("https://accounts.spotify.com/authorize"));
        assert!(url.contains("client_id=client"));
        assert!(url.contains("user-read-recently-played"));
        assert!(url.contains("show_dialog=true"));
    }

    #[tokio::test]
    async fn no_token_cache_means_logged_out() {
        let dir = TempDir::new().unwrap();
        let auth = SpotifyAuth::new(&settings(), dir.path().join(".spotify_cache")).unwrap();
        assert!(auth.client().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_removes_token_cache_and_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(".spotify_cache");
        fs::write(&cache, "{}").unwrap();
        let auth = SpotifyAuth::new(&settings(), cache.clone()).unwrap();

        auth.logout().await.unwrap();
        assert!(!cache.exists());
        auth.logout().await.unwrap();
    }
}

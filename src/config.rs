//! Configuration loading
//!
//! Settings come from a TOML file, then environment variables and command
//! line flags override individual values.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::LookupErrorPolicy;

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "spotify-history-proxy", version, about = "Listening history to playlist proxy for Spotify")]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SPOTIFY_PROXY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(long, env = "RSPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    #[arg(long, env = "RSPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[arg(long, env = "RSPOTIFY_REDIRECT_URI")]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spotify: SpotifySettings,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub history: HistorySettings,
    pub resolver: ResolverSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://localhost:3000/callback".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Where the browser is sent after a successful login
    pub frontend_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            frontend_url: "http://localhost:3000/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    /// Spotify's recently played endpoint
    #[default]
    Api,
    /// Exported streaming history files on disk
    Export,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub source: HistorySource,
    pub export_dir: PathBuf,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            source: HistorySource::Api,
            export_dir: PathBuf::from("data/history"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Remember failed searches as misses instead of retrying them
    pub cache_lookup_errors: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_lookup_errors: true,
        }
    }
}

impl ResolverSettings {
    pub fn policy(&self) -> LookupErrorPolicy {
        if self.cache_lookup_errors {
            LookupErrorPolicy::Remember
        } else {
            LookupErrorPolicy::Retry
        }
    }
}

impl Config {
    /// Load the file at `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the configured file and apply overrides from `args`.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = Self::load(&args.config)?;
        config.apply_args(args);
        Ok(config)
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.client_id.is_some() {
            self.spotify.client_id = args.client_id.clone();
        }
        if args.client_secret.is_some() {
            self.spotify.client_secret = args.client_secret.clone();
        }
        if let Some(uri) = &args.redirect_uri {
            self.spotify.redirect_uri = uri.clone();
        }
    }

    pub fn has_credentials(&self) -> bool {
        let set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        set(&self.spotify.client_id) && set(&self.spotify.client_secret)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {e}")))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.storage.data_dir.join("cache")
    }

    pub fn token_cache_path(&self) -> PathBuf {
        self.cache_dir().join(".spotify_cache")
    }

    pub fn track_cache_path(&self) -> PathBuf {
        self.cache_dir().join("track_cache.json")
    }
}

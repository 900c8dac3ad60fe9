//! Error types shared across the proxy

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the proxy library
#[derive(Error, Debug)]
pub enum Error {
    /// The track cache could not be written to disk
    #[error("Failed to persist track cache to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Spotify API error: {0}")]
    Spotify(#[from] rspotify::ClientError),

    #[error("Invalid Spotify ID: {0}")]
    InvalidId(#[from] rspotify::model::IdError),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authentication error: {0}")]
    Auth(String),

    /// Listening history export could not be read
    #[error("History error: {0}")]
    History(String),
}

pub type Result<T> = std::result::Result<T, Error>;

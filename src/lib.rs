//! Backend for turning Spotify listening history into playlist additions
//!
//! The web client logs in through Spotify OAuth, browses recent listening
//! history and picks entries to append to a playlist. Entries only carry an
//! artist and a title, so each one is resolved to a track ID through a
//! persistent cache that also remembers failed lookups.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod model;

pub use error::{Error, Result};

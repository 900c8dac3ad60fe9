//! Core type definitions shared by the routes and the provider client

use serde::{Deserialize, Serialize};

/// One listening event, as the web client expects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub artist_name: String,
    pub track_name: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms_played: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistImage {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTracks {
    pub total: u32,
}

/// A user's playlist (for the playlist picker)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub images: Vec<PlaylistImage>,
    pub tracks: PlaylistTracks,
}

//! Spotify Web API client wrapper

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rspotify::{
    model::{FullTrack, PlayableId, PlaylistId, SearchResult, SearchType, TimeLimits, TrackId},
    prelude::*,
    AuthCodeSpotify,
};

use super::resolver::{TrackCandidate, TrackSearch};
use super::types::{HistoryEntry, PlaylistImage, PlaylistSummary, PlaylistTracks};
use crate::error::Result;

/// Page size for recently played and playlist listings (Spotify's maximum).
pub const PAGE_LIMIT: u32 = 50;

/// Playlist and history operations used by the routes.
#[async_trait]
pub trait PlaylistService: TrackSearch {
    async fn append_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>>;

    /// Listening events, newest first, optionally only those before `before`.
    async fn recently_played(
        &self,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>>;
}

/// Authenticated Spotify API client
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
}

impl SpotifyClient {
    pub fn new(client: AuthCodeSpotify) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    fn history_entry(track: FullTrack, played_at: DateTime<Utc>) -> HistoryEntry {
        let artists: Vec<String> = track.artists.iter().map(|a| a.name.clone()).collect();
        HistoryEntry {
            artist_name: artists.join(", "),
            album_art_url: track.album.images.first().map(|image| image.url.clone()),
            ms_played: u64::try_from(track.duration.num_milliseconds()).ok(),
            track_name: track.name,
            end_time: played_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[async_trait]
impl TrackSearch for SpotifyClient {
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<TrackCandidate>> {
        let result = self
            .client
            .search(query, SearchType::Track, None, None, Some(limit), None)
            .await;
        crate::log_api_result!("search", result);

        let candidates = match result? {
            SearchResult::Tracks(page) => page
                .items
                .into_iter()
                .filter_map(|track| {
                    let id = track.id.as_ref()?.id().to_string();
                    Some(TrackCandidate {
                        id,
                        name: track.name,
                        artists: track.artists.into_iter().map(|a| a.name).collect(),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(candidates)
    }
}

#[async_trait]
impl PlaylistService for SpotifyClient {
    async fn append_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let playlist = PlaylistId::from_id(playlist_id)?;
        let items = track_ids
            .iter()
            .map(|id| TrackId::from_id(id.as_str()).map(PlayableId::Track))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        crate::log_api_request!("playlist_add_items", playlist_id, count = items.len());
        let result = self.client.playlist_add_items(playlist, items, None).await;
        crate::log_api_result!("playlist_add_items", result);
        result?;
        Ok(())
    }

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let page = self
            .client
            .current_user_playlists_manual(Some(PAGE_LIMIT), None)
            .await;
        crate::log_api_result!("current_user_playlists", page);

        let playlists = page?
            .items
            .into_iter()
            .map(|playlist| PlaylistSummary {
                id: playlist.id.id().to_string(),
                name: playlist.name,
                images: playlist
                    .images
                    .into_iter()
                    .map(|image| PlaylistImage {
                        url: image.url,
                        height: image.height,
                        width: image.width,
                    })
                    .collect(),
                tracks: PlaylistTracks {
                    total: playlist.tracks.total,
                },
            })
            .collect();
        Ok(playlists)
    }

    async fn recently_played(
        &self,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<HistoryEntry>> {
        let time_limit = before.map(TimeLimits::Before);
        crate::log_api_request!("current_user_recently_played", before = ?before, limit);

        let history = self
            .client
            .current_user_recently_played(Some(limit), time_limit)
            .await;
        crate::log_api_result!("current_user_recently_played", history);

        let entries = history?
            .items
            .into_iter()
            .map(|item| Self::history_entry(item.track, item.played_at))
            .collect();
        Ok(entries)
    }
}

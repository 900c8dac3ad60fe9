//! Model module - track resolution and Spotify data types
//!
//! - `types`: History and playlist records sent to the web client
//! - `cache`: Persistent artist/title -> track ID cache
//! - `resolver`: Cache-first track resolution over the provider search
//! - `spotify_client`: Spotify API client wrapper

mod types;
mod cache;
mod resolver;
mod spotify_client;

pub use types::{HistoryEntry, PlaylistImage, PlaylistSummary, PlaylistTracks};

pub use cache::{CacheEntries, TrackCache};

pub use resolver::{
    cache_key, LookupErrorPolicy, SearchOutcome, TrackCandidate, TrackResolver, TrackSearch,
};

pub use spotify_client::{PlaylistService, SpotifyClient, PAGE_LIMIT};

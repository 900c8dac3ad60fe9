//! Free-text (artist, title) -> Spotify track ID resolution

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::cache::TrackCache;
use crate::error::Result;

/// A search hit returned by the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackCandidate {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
}

/// The provider's free-text track search.
#[async_trait]
pub trait TrackSearch: Send + Sync {
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<TrackCandidate>>;
}

/// Outcome of a single provider lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(String),
    NotFound,
    TransientError(String),
}

/// What to do with a lookup that failed rather than came back empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LookupErrorPolicy {
    /// Cache it as a miss, same as `NotFound`.
    #[default]
    Remember,
    /// Leave the key uncached so the next request searches again.
    Retry,
}

/// Cache key for a pair: both fields case-folded, joined by `|`.
pub fn cache_key(artist: &str, title: &str) -> String {
    format!("{}|{}", artist.to_lowercase(), title.to_lowercase())
}

/// Resolves tracks through the cache, falling back to the provider search.
///
/// The cache lock is held for a whole resolution (check, search, persist),
/// so concurrent requests for the same uncached pair search only once.
pub struct TrackResolver {
    cache: Mutex<TrackCache>,
    policy: LookupErrorPolicy,
}

impl TrackResolver {
    pub fn new(cache: TrackCache, policy: LookupErrorPolicy) -> Self {
        Self {
            cache: Mutex::new(cache),
            policy,
        }
    }

    /// Resolve `(artist, title)` to a track ID.
    ///
    /// Provider failures never surface here; they end up as `Ok(None)`.
    /// The only error is a failure to persist the cache.
    pub async fn resolve<S>(&self, search: &S, artist: &str, title: &str) -> Result<Option<String>>
    where
        S: TrackSearch + ?Sized,
    {
        let key = cache_key(artist, title);
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.get(&key) {
            tracing::debug!(key = %key, hit = cached.is_some(), "Track cache hit");
            return Ok(cached.clone());
        }

        let value = match Self::lookup(search, artist, title).await {
            SearchOutcome::Found(id) => Some(id),
            SearchOutcome::NotFound => None,
            SearchOutcome::TransientError(error) => {
                tracing::warn!(key = %key, error = %error, "Track search failed");
                if self.policy == LookupErrorPolicy::Retry {
                    return Ok(None);
                }
                None
            }
        };

        cache.record(key, value.clone())?;
        Ok(value)
    }

    /// One best-effort search, taking the first candidate.
    async fn lookup<S>(search: &S, artist: &str, title: &str) -> SearchOutcome
    where
        S: TrackSearch + ?Sized,
    {
        let query = format!("track:{title} artist:{artist}");
        crate::log_api_request!("search_tracks", query = %query);

        match search.search_tracks(&query, 1).await {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(candidate) => {
                    tracing::info!(
                        artist,
                        title,
                        track_id = %candidate.id,
                        matched_name = %candidate.name,
                        matched_artists = %candidate.artists.join(", "),
                        "Resolved track"
                    );
                    SearchOutcome::Found(candidate.id)
                }
                None => {
                    tracing::info!(artist, title, "No track found");
                    SearchOutcome::NotFound
                }
            },
            Err(e) => SearchOutcome::TransientError(e.to_string()),
        }
    }

    /// Number of cached keys, hits and misses alike.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Search stub returning a fixed answer and counting calls.
    struct StubSearch {
        answer: Option<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSearch {
        fn found(id: &'static str) -> Self {
            Self { answer: Some(id), fail: false, calls: AtomicUsize::new(0) }
        }

        fn empty() -> Self {
            Self { answer: None, fail: false, calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { answer: None, fail: true, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TrackSearch for StubSearch {
        async fn search_tracks(&self, _query: &str, _limit: u32) -> Result<Vec<TrackCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(Error::Auth("connection reset".to_string()));
            }
            Ok(self
                .answer
                .map(|id| TrackCandidate {
                    id: id.to_string(),
                    name: "name".to_string(),
                    artists: vec!["artist".to_string()],
                })
                .into_iter()
                .collect())
        }
    }

    fn resolver_in(dir: &TempDir, policy: LookupErrorPolicy) -> TrackResolver {
        TrackResolver::new(TrackCache::open(dir.path().join("track_cache.json")), policy)
    }

    #[test]
    fn key_is_case_folded_and_pipe_joined() {
        assert_eq!(cache_key("The Beatles", "Let It Be"), "the beatles|let it be");
        assert_eq!(cache_key("DAFT PUNK", "one more time"), cache_key("daft punk", "One More Time"));
    }

    #[tokio::test]
    async fn miss_searches_and_persists() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir, LookupErrorPolicy::Remember);
        let search = StubSearch::found("abc123");

        let id = resolver.resolve(&search, "The Beatles", "Let It Be").await.unwrap();

        assert_eq!(id.as_deref(), Some("abc123"));
        assert_eq!(search.calls(), 1);
        let on_disk = TrackCache::load(&dir.path().join("track_cache.json"));
        assert_eq!(on_disk.get("the beatles|let it be"), Some(&Some("abc123".to_string())));
    }

    #[tokio::test]
    async fn repeated_resolve_searches_once() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir, LookupErrorPolicy::Remember);
        let search = StubSearch::found("id1");

        let first = resolver.resolve(&search, "Daft Punk", "One More Time").await.unwrap();
        let second = resolver.resolve(&search, "daft punk", "one more time").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn empty_result_is_remembered() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir, LookupErrorPolicy::Remember);
        let search = StubSearch::empty();

        assert_eq!(resolver.resolve(&search, "Nobody", "Nothing").await.unwrap(), None);
        assert_eq!(resolver.resolve(&search, "Nobody", "Nothing").await.unwrap(), None);
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn preloaded_negative_entry_skips_search() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track_cache.json");
        std::fs::write(&path, r#"{"unknown artist|unknown track": null}"#).unwrap();
        let resolver = TrackResolver::new(TrackCache::open(&path), LookupErrorPolicy::Remember);
        let search = StubSearch::found("should-not-be-used");

        let id = resolver.resolve(&search, "Unknown Artist", "Unknown Track").await.unwrap();

        assert_eq!(id, None);
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn search_error_is_cached_by_default() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir, LookupErrorPolicy::Remember);
        let search = StubSearch::failing();

        assert_eq!(resolver.resolve(&search, "A", "B").await.unwrap(), None);
        assert_eq!(resolver.resolve(&search, "A", "B").await.unwrap(), None);
        assert_eq!(search.calls(), 1);
        assert_eq!(resolver.cached_len().await, 1);
    }

    #[tokio::test]
    async fn retry_policy_does_not_cache_errors() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir, LookupErrorPolicy::Retry);
        let search = StubSearch::failing();

        assert_eq!(resolver.resolve(&search, "A", "B").await.unwrap(), None);
        assert_eq!(resolver.resolve(&search, "A", "B").await.unwrap(), None);
        assert_eq!(search.calls(), 2);
        assert_eq!(resolver.cached_len().await, 0);
    }

    #[tokio::test]
    async fn retry_policy_still_caches_not_found() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_in(&dir, LookupErrorPolicy::Retry);
        let search = StubSearch::empty();

        resolver.resolve(&search, "A", "B").await.unwrap();
        resolver.resolve(&search, "A", "B").await.unwrap();
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_search_once() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(resolver_in(&dir, LookupErrorPolicy::Remember));
        let search = Arc::new(StubSearch::found("id"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                let search = search.clone();
                tokio::spawn(async move {
                    resolver.resolve(search.as_ref(), "Same", "Song").await.unwrap()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().as_deref(), Some("id"));
        }
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();
        let resolver = TrackResolver::new(
            TrackCache::open(blocker.join("track_cache.json")),
            LookupErrorPolicy::Remember,
        );
        let search = StubSearch::found("id");

        let result = resolver.resolve(&search, "A", "B").await;

        assert!(matches!(result, Err(Error::Persistence { .. })));
        assert_eq!(resolver.cached_len().await, 0);
    }
}

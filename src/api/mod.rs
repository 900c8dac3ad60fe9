//! HTTP API consumed by the web client
//!
//! Routes mirror the single-page app's calls: OAuth login, listening
//! history, playlists, and adding a history entry to a playlist.

mod handlers;
mod response;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::Session;
use crate::history::ExportHistory;
use crate::model::TrackResolver;

pub use response::{ApiError, ApiResponse, ApiResult};

/// Where `/history` reads from
#[derive(Clone)]
pub enum HistoryBackend {
    /// The logged-in user's recently played tracks
    Api,
    Export(Arc<ExportHistory>),
}

/// Shared state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<dyn Session>,
    pub resolver: Arc<TrackResolver>,
    pub history: HistoryBackend,
    /// Page the OAuth callback redirects the browser to
    pub frontend_url: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth", get(handlers::auth_url))
        .route("/auth/status", get(handlers::auth_status))
        .route(
            "/callback",
            get(handlers::callback_redirect).post(handlers::callback),
        )
        .route("/history", get(handlers::history))
        .route("/playlists", get(handlers::playlists))
        .route("/add", post(handlers::add_to_playlist))
        .route("/logout", post(handlers::logout))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

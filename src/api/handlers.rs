use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Html,
    Json,
};
use chrono::DateTime;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::response::{ApiError, ApiResponse, ApiResult};
use super::{AppState, HistoryBackend};
use crate::model::{HistoryEntry, PlaylistService, PlaylistSummary, PAGE_LIMIT};

#[derive(Debug, Default, Deserialize)]
pub struct CodeParams {
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    before: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddParams {
    playlist_id: Option<String>,
    artist_name: Option<String>,
    track_name: Option<String>,
}

/// JSON body, or the type's default when the body is empty or not JSON.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring unparsable request body");
        T::default()
    })
}

/// First of the candidates that is present and not blank.
fn pick(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .filter(|v| !v.trim().is_empty())
        .or(fallback.filter(|v| !v.trim().is_empty()))
}

async fn require_client(state: &AppState) -> ApiResult<Arc<dyn PlaylistService>> {
    state
        .session
        .client()
        .await?
        .ok_or_else(ApiError::unauthorized)
}

fn login_redirect_page(frontend_url: &str) -> String {
    let target = serde_json::to_string(frontend_url).unwrap_or_else(|_| "\"/\"".to_string());
    format!(
        "<!doctype html>\n<html>\n<head><title>Success</title></head>\n\
         <body><script>window.location.href = {target};</script></body>\n</html>\n"
    )
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn auth_url(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let url = state.session.authorize_url()?;
    Ok(Json(json!({ "auth_url": url })))
}

pub async fn auth_status(State(state): State<AppState>) -> Json<Value> {
    let authenticated = match state.session.client().await {
        Ok(client) => client.is_some(),
        Err(e) => {
            tracing::warn!(error = %e, "Auth status check failed");
            false
        }
    };
    Json(json!({ "authenticated": authenticated }))
}

/// `POST /callback` with `{"code": "..."}` from the web client.
pub async fn callback(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<ApiResponse<()>>> {
    let params: CodeParams = parse_body(&body);
    let code = pick(params.code, None)
        .ok_or_else(|| ApiError::bad_request("No authorization code provided"))?;

    state.session.exchange_code(&code).await?;
    Ok(ApiResponse::done())
}

/// `GET /callback?code=...` straight from Spotify's redirect.
pub async fn callback_redirect(
    State(state): State<AppState>,
    Query(params): Query<CodeParams>,
) -> ApiResult<Html<String>> {
    let code = pick(params.code, None)
        .ok_or_else(|| ApiError::bad_request("No authorization code provided"))?;

    state.session.exchange_code(&code).await?;
    Ok(Html(login_redirect_page(&state.frontend_url)))
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<ApiResponse<Vec<HistoryEntry>>>> {
    let client = match &state.history {
        HistoryBackend::Api => Some(require_client(&state).await?),
        HistoryBackend::Export(_) => None,
    };

    // A zero cursor means the newest page
    let before = params
        .before
        .as_deref()
        .map(|raw| raw.trim().parse::<i64>())
        .transpose()
        .map_err(|_| ApiError::bad_request("Invalid before parameter"))?
        .filter(|ms| *ms != 0);

    let entries = match (&state.history, client) {
        (HistoryBackend::Export(export), _) => export.recent(before, PAGE_LIMIT as usize),
        (HistoryBackend::Api, Some(client)) => {
            let before = before
                .map(|ms| {
                    DateTime::from_timestamp_millis(ms)
                        .ok_or_else(|| ApiError::bad_request("Invalid before parameter"))
                })
                .transpose()?;
            client.recently_played(before, PAGE_LIMIT).await?
        }
        (HistoryBackend::Api, None) => return Err(ApiError::unauthorized()),
    };

    Ok(ApiResponse::ok(entries))
}

pub async fn playlists(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<PlaylistSummary>>>> {
    let client = require_client(&state).await?;
    let playlists = client.user_playlists().await?;
    Ok(ApiResponse::ok(playlists))
}

/// Resolve a history entry to a track and append it to a playlist.
///
/// Fields may come from the JSON body or the query string; the body wins.
pub async fn add_to_playlist(
    State(state): State<AppState>,
    Query(query): Query<AddParams>,
    body: Bytes,
) -> ApiResult<Json<ApiResponse<String>>> {
    let client = require_client(&state).await?;

    let body: AddParams = parse_body(&body);
    let (Some(playlist_id), Some(artist_name), Some(track_name)) = (
        pick(body.playlist_id, query.playlist_id),
        pick(body.artist_name, query.artist_name),
        pick(body.track_name, query.track_name),
    ) else {
        return Err(ApiError::bad_request("Missing required data"));
    };

    let track_id = state
        .resolver
        .resolve(&*client, &artist_name, &track_name)
        .await?;

    match track_id {
        Some(track_id) => {
            client.append_tracks(&playlist_id, &[track_id]).await?;
            tracing::info!(playlist_id = %playlist_id, track = %track_name, "Added track to playlist");
            Ok(ApiResponse::ok(format!(
                "Successfully added '{track_name}' to playlist!"
            )))
        }
        None => Ok(ApiResponse::failed(format!(
            "Could not find Spotify ID for '{track_name}' by '{artist_name}'"
        ))),
    }
}

pub async fn logout(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<()>>> {
    state.session.logout().await?;
    Ok(ApiResponse::done())
}

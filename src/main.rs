use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use spotify_history_proxy::{
    api::{self, AppState, HistoryBackend},
    auth::SpotifyAuth,
    config::{Args, Config, HistorySource},
    history::ExportHistory,
    logging,
    model::{TrackCache, TrackResolver},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== Spotify History Proxy Starting ===");

    let config = Config::from_args(&args)?;
    if !config.has_credentials() {
        tracing::error!(
            config = %args.config.display(),
            "Spotify API credentials are not configured"
        );
        anyhow::bail!("missing Spotify client_id/client_secret");
    }

    let session = SpotifyAuth::new(&config.spotify, config.token_cache_path())?;

    let cache = TrackCache::open(config.track_cache_path());
    let resolver = TrackResolver::new(cache, config.resolver.policy());

    let history = match config.history.source {
        HistorySource::Api => HistoryBackend::Api,
        HistorySource::Export => {
            let export = ExportHistory::open(&config.history.export_dir).with_context(|| {
                format!(
                    "loading history export from {}",
                    config.history.export_dir.display()
                )
            })?;
            HistoryBackend::Export(Arc::new(export))
        }
    };

    let state = AppState {
        session: Arc::new(session),
        resolver: Arc::new(resolver),
        history,
        frontend_url: config.server.frontend_url.clone(),
    };

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, api::build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Spotify History Proxy shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

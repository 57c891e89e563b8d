mod api;
mod config;
mod error;
mod session;
mod state;
mod templates;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, Router};
use chrono::Utc;
use text2dataset_core::{open_store, DatasetStore, OutputDirectory};
use tokio::time::MissedTickBehavior;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

/// Room for multipart framing and the text fields around an upload
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + FORM_OVERHEAD;

    Router::new()
        .merge(api::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Delete expired output files and dataset records, and drop idle sessions.
async fn sweep(state: &AppState) {
    match state.outputs.sweep_expired(state.config.retention()).await {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "Removed expired output files"),
        Err(e) => tracing::warn!(error = %e, "Output sweep failed"),
    }

    match state.store.purge_expired(Utc::now()).await {
        Ok(0) => {}
        Ok(purged) => tracing::info!(purged, "Purged expired datasets"),
        Err(e) => tracing::warn!(error = %e, "Dataset purge failed"),
    }

    let mut sessions = state.sessions.write().await;
    let idle = sessions.purge_idle();
    if idle > 0 {
        tracing::debug!(idle, active = sessions.len(), "Dropped idle sessions");
    }
}

fn spawn_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = state.config.sweep_interval().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sweep(&state).await;
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env();

    let default_filter = if config.debug {
        "text2dataset_web=debug,text2dataset_core=debug,tower_http=debug"
    } else {
        "text2dataset_web=info,text2dataset_core=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let store = open_store(config.database_url.as_deref(), config.data_dir.clone()).await?;
    tracing::info!(
        database = %config.database_name,
        backend = store.backend(),
        "Storage ready"
    );
    let outputs = OutputDirectory::create(config.output_dir.clone()).await?;
    let bind = format!("{}:{}", config.host, config.port);

    let state = AppState::new(config, Arc::new(store), outputs);
    spawn_sweeper(state.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Starting text2dataset on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

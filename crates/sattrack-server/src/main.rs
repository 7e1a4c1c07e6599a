//! Sattrack Server - satellite fleet dashboard backend

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sattrack_server::config::Config;
use sattrack_server::loops::{self, alert_persist_loop, proximity_loop, refresh_loop};
use sattrack_server::persistence;
use sattrack_server::state::AppState;
use sattrack_server::api;
use sattrack_sources::{
    DataSourceAdapter, FleetSource, JsonFeedProvider, N2yoClient, N2yoProvider, PositionProvider,
};

const ALERT_LOG_QUEUE: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_json)?;

    tracing::info!("Starting Sattrack Server...");

    let n2yo = match config.n2yo_api_key.as_deref() {
        Some(key) => Some(N2yoClient::new(
            &config.n2yo_base_url,
            key,
            config.provider_timeout(),
        )?),
        None => {
            tracing::info!("N2YO_API_KEY not set; N2YO provider disabled");
            None
        }
    };
    let source: Arc<dyn FleetSource> = Arc::new(build_source(&config, n2yo.clone())?);
    tracing::info!("Data source: {}", source.describe());

    let database = match config.database_path.as_deref() {
        Some(path) => match persistence::init_database(path, config.database_max_connections).await {
            Ok(db) => Some(db),
            Err(err) => {
                tracing::warn!("Alert log disabled: {:#}", err);
                None
            }
        },
        None => None,
    };

    let port = config.server_port;
    let mut state = AppState::new(config)?;
    if let Some(db) = database.clone() {
        state = state.with_database(db);
    }
    if let Some(client) = n2yo {
        state = state.with_n2yo(client);
    }
    let state = Arc::new(state);

    // Populate the fleet before anything is scheduled or served.
    refresh_loop::refresh_once(&state, source.as_ref()).await;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    // The alert log stops only after the loops feeding it, so their last
    // batch is still written.
    let (persist_shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut persist_handle = None;
    let persist_tx = database.map(|db| {
        let (tx, rx) = mpsc::channel(ALERT_LOG_QUEUE);
        persist_handle = Some(tokio::spawn(alert_persist_loop::run_alert_persist_loop(
            db,
            rx,
            persist_shutdown_tx.subscribe(),
        )));
        tx
    });
    let producers = vec![
        (
            "refresh",
            tokio::spawn(refresh_loop::run_refresh_loop(
                state.clone(),
                source.clone(),
                shutdown_tx.subscribe(),
            )),
        ),
        (
            "proximity",
            tokio::spawn(proximity_loop::run_proximity_loop(
                state.clone(),
                persist_tx,
                shutdown_tx.subscribe(),
            )),
        ),
    ];

    let app = api::app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let signal_tx = shutdown_tx.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            tracing::info!("Shutdown requested");
            let _ = signal_tx.send(());
        })
        .await;

    // Also reached when serve fails, so loops always get the signal.
    let _ = shutdown_tx.send(());
    let mut finished = loops::join_loops(producers, SHUTDOWN_GRACE).await;
    if let Some(handle) = persist_handle {
        let _ = persist_shutdown_tx.send(());
        finished += loops::join_loops(vec![("alert persistence", handle)], SHUTDOWN_GRACE).await;
    }
    tracing::info!("{} background loops stopped", finished);

    served?;
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        .add_directive("sattrack_server=debug".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

/// Providers in priority order: N2YO first when a key is set, then feeds.
fn build_source(config: &Config, n2yo: Option<N2yoClient>) -> Result<DataSourceAdapter> {
    let mut adapter =
        DataSourceAdapter::new(config.provider_timeout()).force_synthetic(config.use_synthetic);

    if let Some(client) = n2yo {
        adapter = adapter.with_provider(Box::new(N2yoProvider::new(client)));
    }

    for (index, url) in config.feed_urls.iter().enumerate() {
        let provider = JsonFeedProvider::new(format!("feed-{}", index + 1), url, config.provider_timeout())?;
        tracing::info!("Feed provider {} -> {}", provider.name(), provider.url());
        adapter = adapter.with_provider(Box::new(provider));
    }

    Ok(adapter)
}

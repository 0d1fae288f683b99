//! Kick station binary entrypoint wiring the serial link, score queue, remote store and HTTP/SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kicklab_station::{
    config::{RemoteBackend, StationConfig},
    dao::{
        remote_store::{RemoteStore, memory::MemoryRemoteStore},
        storage::StorageError,
    },
    routes,
    services::{connectivity, device_service},
    state::{AppState, SharedState, StationEvent},
    sync::{local_store::SqliteDeltaLog, queue::OfflineQueue},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = StationConfig::load();
    let log = SqliteDeltaLog::connect(&config.queue_database_url)
        .await
        .context("opening local delta log")?;
    let queue = OfflineQueue::new(Arc::new(log));
    match queue.pending_count().await {
        Ok(0) => {}
        Ok(pending) => info!(pending, "pending score deltas carried over from last run"),
        Err(err) => warn!(error = %err, "failed to count pending score deltas"),
    }

    let backend = config.remote;
    let serial = config.serial_settings();
    let app_state = AppState::new(config, queue);

    let _cue_log = app_state.events().listen(|event| {
        if let StationEvent::Cue(cue) = event {
            info!(?cue, "cue");
        }
    });

    let memory = MemoryRemoteStore::new();
    tokio::spawn(connectivity::run(app_state.clone(), move || {
        connect_remote(backend, memory.clone())
    }));
    tokio::spawn(connectivity::publish_changes(app_state.clone()));
    tokio::spawn(connectivity::retry_flushes(
        app_state.clone(),
        connectivity::RETRY_FLUSH_INTERVAL,
    ));

    match serial {
        Some(settings) => {
            tokio::spawn(device_service::run(app_state.clone(), settings));
        }
        None => warn!("no serial port configured; kick pads disabled"),
    }

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Open the configured remote store.
async fn connect_remote(
    backend: RemoteBackend,
    memory: MemoryRemoteStore,
) -> Result<Arc<dyn RemoteStore>, StorageError> {
    match backend {
        RemoteBackend::Memory => Ok(Arc::new(memory)),
        #[cfg(feature = "couch-store")]
        RemoteBackend::Couch => {
            use kicklab_station::dao::remote_store::couchdb::{CouchConfig, CouchRemoteStore};

            let config = CouchConfig::from_env()?;
            let store = CouchRemoteStore::connect(config).await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "mongo-store")]
        RemoteBackend::Mongo => {
            use kicklab_station::dao::remote_store::mongodb::{MongoConfig, MongoRemoteStore};

            let config = MongoConfig::from_env().await?;
            let store = MongoRemoteStore::connect(config).await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => Err(StorageError::unavailable(
            format!("remote backend {other:?} not compiled in"),
            std::io::Error::other("feature disabled"),
        )),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

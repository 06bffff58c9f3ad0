use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::Router;
use lingo_backend::config::Config;
use lingo_backend::logging::{init_tracing, LogConfig};
use lingo_backend::routes::build_router;
use lingo_backend::state::AppState;
use lingo_backend::store::Store;
use lingo_backend::workers::WorkerManager;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(&LogConfig {
        log_level: config.log_level.clone(),
        enable_file_logs: config.enable_file_logs,
        log_dir: config.log_dir.clone(),
    });
    tracing::info!(
        sled_path = %config.sled_path,
        max_new_cards_per_day = config.scheduler.max_new_cards_per_day,
        max_reviews_per_day = config.scheduler.max_reviews_per_day,
        "Starting lingo-backend"
    );

    let store = Arc::new(Store::open(&config.sled_path).expect("Failed to open sled database"));
    store.run_migrations().expect("Failed to run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let workers = spawn_workers(&store, &config, &shutdown_tx);
    let app = build_app(AppState::new(store.clone(), &config, shutdown_tx.clone()), &config);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
    {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    if let Some(handle) = workers {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

/// Only the leader process runs the cleanup and flush jobs.
fn spawn_workers(
    store: &Arc<Store>,
    config: &Config,
    shutdown_tx: &broadcast::Sender<()>,
) -> Option<JoinHandle<()>> {
    if !config.worker.is_leader {
        tracing::info!("Not the worker leader, background jobs disabled");
        return None;
    }
    let manager = WorkerManager::new(
        store.clone(),
        shutdown_tx.subscribe(),
        &config.worker,
        config.session_ttl_hours,
    );
    Some(tokio::spawn(async move {
        if let Err(e) = manager.start().await {
            tracing::error!(error = %e, "Worker manager failed");
        }
    }))
}

fn build_app(state: AppState, config: &Config) -> Router {
    build_router(state)
        .layer(cors_layer(&config.cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods(Any);
    match origin.trim() {
        "*" => layer.allow_origin(Any),
        origin => match origin.parse::<HeaderValue>() {
            Ok(value) => layer.allow_origin(value),
            Err(e) => panic!("Invalid CORS_ORIGIN '{origin}': {e}"),
        },
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}

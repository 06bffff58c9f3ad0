use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use lingo_backend::config::{Config, WorkerConfig};
use lingo_backend::routes::build_router;
use lingo_backend::srs::SchedulerSettings;
use lingo_backend::state::AppState;
use lingo_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

pub async fn spawn_test_app_with(scheduler: SchedulerSettings) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("lingo-test.sled");

    // Built directly so parallel tests never race on process env vars.
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        session_ttl_hours: 24,
        worker: WorkerConfig {
            is_leader: false,
            enable_store_flush: false,
        },
        scheduler,
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_test_app_with(SchedulerSettings::default()).await
}

use chrono::{Duration, Utc};

use crate::store::Store;

pub async fn run(store: &Store, ttl_hours: i64) {
    tracing::debug!("session_cleanup: start");
    match store.cleanup_expired_sessions(Duration::hours(ttl_hours), Utc::now()) {
        Ok(count) => tracing::info!(cleaned = count, "session_cleanup: done"),
        Err(e) => tracing::error!(error=%e, "session_cleanup failed"),
    }
}

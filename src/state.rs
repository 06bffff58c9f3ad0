use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::srs::{SchedulerSettings, SettingsOverride, SrsError};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: &Config, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            store,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &SchedulerSettings {
        &self.config.scheduler
    }

    /// Process defaults with an optional per-request override applied.
    pub fn scheduler_with(
        &self,
        patch: Option<&SettingsOverride>,
    ) -> Result<SchedulerSettings, SrsError> {
        let settings = match patch {
            Some(patch) => self.config.scheduler.with_override(patch),
            None => self.config.scheduler.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

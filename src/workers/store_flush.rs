use crate::store::Store;

pub async fn run(store: &Store) {
    match store.flush() {
        Ok(()) => tracing::debug!("store_flush: done"),
        Err(e) => tracing::error!(error=%e, "store_flush failed"),
    }
}

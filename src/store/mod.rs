pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Db;
use thiserror::Error;

use crate::constants::MAX_CAS_RETRIES;
use crate::srs::SrsError;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub decks: sled::Tree,
    pub cards: sled::Tree,
    pub deck_cards: sled::Tree,
    pub study_sessions: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("CAS retry exhausted after {attempts} attempts: entity={entity}, key={key}")]
    CasRetryExhausted {
        entity: String,
        key: String,
        attempts: u32,
    },
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Srs(#[from] SrsError),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl StoreError {
    pub fn not_found(entity: &str, key: &str) -> Self {
        StoreError::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let decks = db.open_tree(trees::DECKS)?;
        let cards = db.open_tree(trees::CARDS)?;
        let deck_cards = db.open_tree(trees::DECK_CARDS)?;
        let study_sessions = db.open_tree(trees::STUDY_SESSIONS)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            decks,
            cards,
            deck_cards,
            study_sessions,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read-modify-write of one record with compare-and-swap, retried up to
    /// `MAX_CAS_RETRIES` times. `update` may run more than once and must not
    /// have side effects.
    pub(crate) fn cas_update<T, R, F>(
        &self,
        tree: &sled::Tree,
        entity: &str,
        key: &str,
        mut update: F,
    ) -> Result<(T, R), StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(T) -> Result<(T, R), StoreError>,
    {
        for attempt in 1..=MAX_CAS_RETRIES {
            let Some(current_raw) = tree.get(key.as_bytes())? else {
                return Err(StoreError::not_found(entity, key));
            };
            let current: T = Self::deserialize(&current_raw)?;
            let (next, extra) = update(current)?;
            let next_raw = Self::serialize(&next)?;

            match tree.compare_and_swap(
                key.as_bytes(),
                Some(current_raw.as_ref()),
                Some(next_raw),
            )? {
                Ok(()) => return Ok((next, extra)),
                Err(_) => {
                    tracing::debug!(entity, key, attempt, "CAS conflict, retrying");
                }
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: entity.to_string(),
            key: key.to_string(),
            attempts: MAX_CAS_RETRIES,
        })
    }
}

pub(crate) fn tx_abort<E: Into<StoreError>>(error: E) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(error.into())
}

pub(crate) fn map_tx_error(error: TransactionError<StoreError>) -> StoreError {
    match error {
        TransactionError::Abort(store_error) => store_error,
        TransactionError::Storage(storage_error) => StoreError::Sled(storage_error),
    }
}

use std::collections::HashMap;

use crate::store::operations::decks::Deck;
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_recount_deck_cards", m002_recount_deck_cards),
    ]
}

/// Applies every migration newer than the stored version.
///
/// - Each migration must be idempotent: the process may crash after a
///   migration finishes but before its version is written.
/// - The version is persisted right after each successful migration.
/// - Forward only: `set_version` refuses to downgrade.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("stored version has {} bytes, expected 4", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// Rebuilds `Deck::card_count` from the position index.
fn m002_recount_deck_cards(store: &Store) -> Result<(), StoreError> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for item in store.deck_cards.iter() {
        let (key, _) = item?;
        let key = String::from_utf8_lossy(&key);
        if let Some((deck_id, _)) = key.rsplit_once(':') {
            *counts.entry(deck_id.to_string()).or_default() += 1;
        }
    }

    for item in store.decks.iter() {
        let (key, value) = item?;
        let mut deck: Deck = Store::deserialize(&value)?;
        let actual = counts.get(&deck.id).copied().unwrap_or(0);
        if deck.card_count != actual {
            tracing::info!(deck_id = %deck.id, stored = deck.card_count, actual, "Fixing deck card count");
            deck.card_count = actual;
            store.decks.insert(key, Store::serialize(&deck)?)?;
        }
    }

    Ok(())
}

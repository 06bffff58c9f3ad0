//! `{cardId, srsData}` backup format for schedule state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::types::{CardScheduleState, Flashcard, SrsError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsBackupEntry {
    pub card_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs_data: Option<CardScheduleState>,
}

pub fn export_entries(cards: &[Flashcard]) -> Vec<SrsBackupEntry> {
    cards
        .iter()
        .map(|card| SrsBackupEntry {
            card_id: card.id.clone(),
            srs_data: card.srs_data.clone(),
        })
        .collect()
}

pub fn export_srs_data(cards: &[Flashcard]) -> Result<String, SrsError> {
    serde_json::to_string_pretty(&export_entries(cards))
        .map_err(|e| SrsError::InvalidBackup(e.to_string()))
}

/// Parse and integrity-check a backup document.
pub fn parse_backup(raw: &str) -> Result<Vec<SrsBackupEntry>, SrsError> {
    let entries: Vec<SrsBackupEntry> =
        serde_json::from_str(raw).map_err(|e| SrsError::InvalidBackup(e.to_string()))?;
    for entry in &entries {
        if let Some(state) = &entry.srs_data {
            state.validate()?;
        }
    }
    Ok(entries)
}

/// Overlay backup state onto `cards`. Cards missing from the backup, or
/// whose entry has no state, keep their current state. Later duplicate
/// entries win.
pub fn apply_backup(cards: Vec<Flashcard>, entries: Vec<SrsBackupEntry>) -> Vec<Flashcard> {
    let by_card_id: HashMap<String, CardScheduleState> = entries
        .into_iter()
        .filter_map(|entry| entry.srs_data.map(|state| (entry.card_id, state)))
        .collect();

    cards
        .into_iter()
        .map(|mut card| {
            if let Some(state) = by_card_id.get(&card.id) {
                card.srs_data = Some(state.clone());
            }
            card
        })
        .collect()
}

pub fn import_srs_data(cards: Vec<Flashcard>, raw: &str) -> Result<Vec<Flashcard>, SrsError> {
    let entries = parse_backup(raw)?;
    Ok(apply_backup(cards, entries))
}

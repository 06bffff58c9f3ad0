use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::store::keys;
use crate::store::{map_tx_error, Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub language_code: String,
    #[serde(default)]
    pub is_built_in: bool,
    #[serde(default = "default_srs_enabled")]
    pub srs_enabled: bool,
    #[serde(default)]
    pub card_count: u64,
    /// Next free slot in the `deck_cards` index. Never reused after deletes.
    #[serde(default)]
    pub next_position: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studied_at: Option<DateTime<Utc>>,
}

fn default_srs_enabled() -> bool {
    true
}

impl Deck {
    pub fn new(name: &str, language_code: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: String::new(),
            language_code: language_code.to_string(),
            is_built_in: false,
            srs_enabled: true,
            card_count: 0,
            next_position: 0,
            created_at: now,
            updated_at: now,
            studied_at: None,
        }
    }
}

impl Store {
    pub fn create_deck(&self, deck: &Deck) -> Result<(), StoreError> {
        let key = keys::deck_key(&deck.id);
        let cas_result = self.decks.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(Self::serialize(deck)?),
        )?;

        if cas_result.is_err() {
            return Err(StoreError::Conflict {
                entity: "deck".to_string(),
                key: deck.id.clone(),
            });
        }
        Ok(())
    }

    pub fn get_deck(&self, deck_id: &str) -> Result<Option<Deck>, StoreError> {
        let key = keys::deck_key(deck_id);
        match self.decks.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn require_deck(&self, deck_id: &str) -> Result<Deck, StoreError> {
        self.get_deck(deck_id)?
            .ok_or_else(|| StoreError::not_found("deck", deck_id))
    }

    /// Newest first.
    pub fn list_decks(&self) -> Result<Vec<Deck>, StoreError> {
        let mut decks = Vec::new();
        for item in self.decks.iter() {
            let (_, value) = item?;
            decks.push(Self::deserialize::<Deck>(&value)?);
        }
        decks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(decks)
    }

    /// Applies `patch` to the stored deck. Card bookkeeping fields are owned
    /// by the card operations and are restored after the patch runs.
    pub fn update_deck<F>(
        &self,
        deck_id: &str,
        now: DateTime<Utc>,
        patch: F,
    ) -> Result<Deck, StoreError>
    where
        F: Fn(&mut Deck),
    {
        let key = keys::deck_key(deck_id);
        let (deck, ()) = self.cas_update(&self.decks, "deck", &key, |mut deck: Deck| {
            let card_count = deck.card_count;
            let next_position = deck.next_position;
            let id = deck.id.clone();
            let created_at = deck.created_at;

            patch(&mut deck);

            deck.id = id;
            deck.created_at = created_at;
            deck.card_count = card_count;
            deck.next_position = next_position;
            deck.updated_at = now;
            Ok((deck, ()))
        })?;
        Ok(deck)
    }

    pub fn mark_deck_studied(&self, deck_id: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let key = keys::deck_key(deck_id);
        self.cas_update(&self.decks, "deck", &key, |mut deck: Deck| {
            deck.studied_at = Some(now);
            Ok((deck, ()))
        })?;
        Ok(())
    }

    /// Deletes the deck together with its cards and index entries.
    pub fn delete_deck(&self, deck_id: &str) -> Result<bool, StoreError> {
        let deck_key = keys::deck_key(deck_id);
        if !self.decks.contains_key(deck_key.as_bytes())? {
            return Ok(false);
        }

        let mut index_keys = Vec::new();
        let mut card_ids = Vec::new();
        for item in self.deck_cards.scan_prefix(keys::deck_card_prefix(deck_id).as_bytes()) {
            let (key, value) = item?;
            index_keys.push(key.to_vec());
            card_ids.push(String::from_utf8_lossy(&value).to_string());
        }

        (&self.decks, &self.cards, &self.deck_cards)
            .transaction(|(tx_decks, tx_cards, tx_index)| {
                for key in &index_keys {
                    tx_index.remove(key.as_slice())?;
                }
                for card_id in &card_ids {
                    tx_cards.remove(keys::card_key(card_id).as_bytes())?;
                }
                tx_decks.remove(deck_key.as_bytes())?;
                Ok(())
            })
            .map_err(map_tx_error)?;

        tracing::info!(deck_id, removed_cards = card_ids.len(), "Deck deleted");
        Ok(true)
    }
}

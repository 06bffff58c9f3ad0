use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::srs::{
    self, CardScheduleState, Difficulty, Flashcard, Quality, ReviewResult, SchedulerSettings,
};
use crate::store::operations::decks::Deck;
use crate::store::{keys, map_tx_error, tx_abort, Store, StoreError};

/// A flashcard as stored: the card itself plus its place in a deck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeckCard {
    pub deck_id: String,
    pub position: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub card: Flashcard,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    pub front: Option<String>,
    pub back: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl Store {
    /// Appends `card` at the deck's next position.
    pub fn add_card(
        &self,
        deck_id: &str,
        card: Flashcard,
        now: DateTime<Utc>,
    ) -> Result<DeckCard, StoreError> {
        if let Some(state) = &card.srs_data {
            state.validate()?;
        }

        let deck_key = keys::deck_key(deck_id);
        let card_key = keys::card_key(&card.id);

        (&self.decks, &self.cards, &self.deck_cards)
            .transaction(|(tx_decks, tx_cards, tx_index)| {
                let Some(raw_deck) = tx_decks.get(deck_key.as_bytes())? else {
                    return Err(tx_abort(StoreError::not_found("deck", deck_id)));
                };
                if tx_cards.get(card_key.as_bytes())?.is_some() {
                    return Err(tx_abort(StoreError::Conflict {
                        entity: "card".to_string(),
                        key: card.id.clone(),
                    }));
                }

                let mut deck: Deck = serde_json::from_slice(&raw_deck).map_err(tx_abort)?;
                let entry = DeckCard {
                    deck_id: deck_id.to_string(),
                    position: deck.next_position,
                    created_at: now,
                    updated_at: now,
                    card: card.clone(),
                };
                deck.next_position += 1;
                deck.card_count += 1;
                deck.updated_at = now;

                let entry_bytes = serde_json::to_vec(&entry).map_err(tx_abort)?;
                let deck_bytes = serde_json::to_vec(&deck).map_err(tx_abort)?;
                let index_key = keys::deck_card_key(deck_id, entry.position);

                tx_cards.insert(card_key.as_bytes(), entry_bytes)?;
                tx_index.insert(index_key.as_bytes(), card.id.as_bytes())?;
                tx_decks.insert(deck_key.as_bytes(), deck_bytes)?;
                Ok(entry)
            })
            .map_err(map_tx_error)
    }

    pub fn get_card(&self, card_id: &str) -> Result<Option<DeckCard>, StoreError> {
        let key = keys::card_key(card_id);
        match self.cards.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn require_card(&self, card_id: &str) -> Result<DeckCard, StoreError> {
        self.get_card(card_id)?
            .ok_or_else(|| StoreError::not_found("card", card_id))
    }

    /// Cards of a deck in insertion order.
    pub fn list_deck_cards(&self, deck_id: &str) -> Result<Vec<DeckCard>, StoreError> {
        let mut cards = Vec::new();
        for item in self.deck_cards.scan_prefix(keys::deck_card_prefix(deck_id).as_bytes()) {
            let (index_key, card_id) = item?;
            let card_id = String::from_utf8_lossy(&card_id);
            match self.get_card(&card_id)? {
                Some(card) => cards.push(card),
                None => {
                    tracing::warn!(
                        index_key = %String::from_utf8_lossy(&index_key),
                        card_id = %card_id,
                        "Dangling deck card index entry"
                    );
                }
            }
        }
        Ok(cards)
    }

    pub fn list_deck_flashcards(&self, deck_id: &str) -> Result<Vec<Flashcard>, StoreError> {
        Ok(self
            .list_deck_cards(deck_id)?
            .into_iter()
            .map(|entry| entry.card)
            .collect())
    }

    pub fn update_card_content(
        &self,
        card_id: &str,
        patch: &CardPatch,
        now: DateTime<Utc>,
    ) -> Result<DeckCard, StoreError> {
        let key = keys::card_key(card_id);
        let (entry, ()) = self.cas_update(&self.cards, "card", &key, |mut entry: DeckCard| {
            if let Some(front) = &patch.front {
                entry.card.front = front.clone();
            }
            if let Some(back) = &patch.back {
                entry.card.back = back.clone();
            }
            if let Some(difficulty) = patch.difficulty {
                entry.card.difficulty = Some(difficulty);
            }
            entry.updated_at = now;
            Ok((entry, ()))
        })?;
        Ok(entry)
    }

    /// Replaces the schedule state of a card. `None` resets the card to
    /// "no state yet".
    pub fn set_card_schedule(
        &self,
        card_id: &str,
        state: Option<CardScheduleState>,
        now: DateTime<Utc>,
    ) -> Result<DeckCard, StoreError> {
        if let Some(state) = &state {
            state.validate()?;
        }
        let key = keys::card_key(card_id);
        let (entry, ()) = self.cas_update(&self.cards, "card", &key, |mut entry: DeckCard| {
            entry.card.srs_data = state.clone();
            entry.updated_at = now;
            Ok((entry, ()))
        })?;
        Ok(entry)
    }

    pub fn delete_card(&self, card_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let card_key = keys::card_key(card_id);

        (&self.decks, &self.cards, &self.deck_cards)
            .transaction(|(tx_decks, tx_cards, tx_index)| {
                let Some(raw_entry) = tx_cards.remove(card_key.as_bytes())? else {
                    return Ok(false);
                };
                let entry: DeckCard = serde_json::from_slice(&raw_entry).map_err(tx_abort)?;
                tx_index.remove(keys::deck_card_key(&entry.deck_id, entry.position).as_bytes())?;

                let deck_key = keys::deck_key(&entry.deck_id);
                if let Some(raw_deck) = tx_decks.get(deck_key.as_bytes())? {
                    let mut deck: Deck = serde_json::from_slice(&raw_deck).map_err(tx_abort)?;
                    deck.card_count = deck.card_count.saturating_sub(1);
                    deck.updated_at = now;
                    let deck_bytes = serde_json::to_vec(&deck).map_err(tx_abort)?;
                    tx_decks.insert(deck_key.as_bytes(), deck_bytes)?;
                }
                Ok(true)
            })
            .map_err(map_tx_error)
    }

    /// Applies one review to a stored card. The read-compute-write runs as a
    /// CAS loop so two concurrent reviews of the same card are serialized
    /// and the second one sees the first one's result.
    pub fn review_card(
        &self,
        card_id: &str,
        quality: Quality,
        settings: &SchedulerSettings,
        now: DateTime<Utc>,
    ) -> Result<(DeckCard, ReviewResult), StoreError> {
        let key = keys::card_key(card_id);
        let (entry, review_result) =
            self.cas_update(&self.cards, "card", &key, |mut entry: DeckCard| {
                let outcome = srs::calculate_next_review_at(&entry.card, quality, settings, now)?;
                entry.card = outcome.updated_card;
                entry.updated_at = now;
                Ok((entry, outcome.review_result))
            })?;

        tracing::info!(
            card_id,
            deck_id = %entry.deck_id,
            quality = quality.value(),
            previous_interval = review_result.previous_interval,
            new_interval = review_result.new_interval,
            "Card reviewed"
        );
        Ok((entry, review_result))
    }

    /// Overlays a `{cardId, srsData}` backup onto the cards of a deck. The
    /// whole document is validated first and the changed cards are written
    /// in one transaction, so an import applies fully or not at all.
    /// Returns the number of cards whose state changed.
    pub fn import_deck_schedule(
        &self,
        deck_id: &str,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let current = self.list_deck_flashcards(deck_id)?;
        let imported = srs::import_srs_data(current.clone(), raw)?;

        let changes: Vec<(String, Option<CardScheduleState>)> = current
            .iter()
            .zip(imported)
            .filter(|(before, after)| before.srs_data != after.srs_data)
            .map(|(_, after)| (after.id, after.srs_data))
            .collect();
        self.write_schedules(&changes, now)?;

        tracing::info!(deck_id, changed = changes.len(), "Schedule backup imported");
        Ok(changes.len())
    }

    /// Replaces the schedule state of several cards in one transaction. A
    /// missing card aborts the whole batch.
    pub(crate) fn write_schedules(
        &self,
        changes: &[(String, Option<CardScheduleState>)],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.cards
            .transaction(|tx_cards| {
                for (card_id, state) in changes {
                    let card_key = keys::card_key(card_id);
                    let Some(raw_entry) = tx_cards.get(card_key.as_bytes())? else {
                        return Err(tx_abort(StoreError::not_found("card", card_id)));
                    };
                    let mut entry: DeckCard =
                        serde_json::from_slice(&raw_entry).map_err(tx_abort)?;
                    entry.card.srs_data = state.clone();
                    entry.updated_at = now;
                    let entry_bytes = serde_json::to_vec(&entry).map_err(tx_abort)?;
                    tx_cards.insert(card_key.as_bytes(), entry_bytes)?;
                }
                Ok(())
            })
            .map_err(map_tx_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use super::*;
    use crate::srs::SrsError;

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        (dir, store)
    }

    fn deck_with_cards(store: &Store, fronts: &[&str]) -> (Deck, Vec<DeckCard>) {
        let now = Utc::now();
        let deck = Deck::new("Portuguese", "pt", now);
        store.create_deck(&deck).unwrap();
        let cards = fronts
            .iter()
            .map(|front| store.add_card(&deck.id, Flashcard::new(front, "x"), now).unwrap())
            .collect();
        (deck, cards)
    }

    #[test]
    fn add_card_to_missing_deck_is_not_found() {
        let (_dir, store) = open_store();
        let err = store
            .add_card("missing", Flashcard::new("a", "b"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.cards.len(), 0);
    }

    #[test]
    fn cards_list_in_insertion_order() {
        let (_dir, store) = open_store();
        let fronts: Vec<String> = (0..12).map(|i| format!("word{i}")).collect();
        let refs: Vec<&str> = fronts.iter().map(String::as_str).collect();
        let (deck, _) = deck_with_cards(&store, &refs);

        let listed: Vec<String> = store
            .list_deck_cards(&deck.id)
            .unwrap()
            .into_iter()
            .map(|c| c.card.front)
            .collect();
        assert_eq!(listed, fronts);
        assert_eq!(store.require_deck(&deck.id).unwrap().card_count, 12);
    }

    #[test]
    fn delete_card_updates_index_and_count() {
        let (_dir, store) = open_store();
        let (deck, cards) = deck_with_cards(&store, &["um", "dois", "três"]);

        assert!(store.delete_card(&cards[1].card.id, Utc::now()).unwrap());
        assert!(!store.delete_card(&cards[1].card.id, Utc::now()).unwrap());

        let fronts: Vec<String> = store
            .list_deck_cards(&deck.id)
            .unwrap()
            .into_iter()
            .map(|c| c.card.front)
            .collect();
        assert_eq!(fronts, vec!["um", "três"]);

        let deck = store.require_deck(&deck.id).unwrap();
        assert_eq!(deck.card_count, 2);
        assert_eq!(deck.next_position, 3);
    }

    #[test]
    fn review_persists_new_state() {
        let (_dir, store) = open_store();
        let (_, cards) = deck_with_cards(&store, &["gato"]);
        let id = &cards[0].card.id;

        let (entry, result) = store
            .review_card(id, Quality::PERFECT, &SchedulerSettings::default(), Utc::now())
            .unwrap();
        assert_eq!(result.new_interval, 5);
        assert_eq!(entry.card.srs_data.as_ref().unwrap().repetitions, 1);

        let stored = store.require_card(id).unwrap();
        assert_eq!(stored.card.srs_data, entry.card.srs_data);
    }

    #[test]
    fn review_rejects_corrupt_state() {
        let (_dir, store) = open_store();
        let (_, cards) = deck_with_cards(&store, &["cão"]);
        let id = cards[0].card.id.clone();

        let mut entry = store.require_card(&id).unwrap();
        let mut state = CardScheduleState::new(Utc::now());
        state.interval = -4;
        entry.card.srs_data = Some(state);
        store
            .cards
            .insert(id.as_bytes(), Store::serialize(&entry).unwrap())
            .unwrap();

        let err = store
            .review_card(&id, Quality::GOOD, &SchedulerSettings::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Srs(SrsError::CorruptState { field: "interval", .. })
        ));
    }

    #[test]
    fn concurrent_reviews_are_not_lost() {
        let (_dir, store) = open_store();
        let store = Arc::new(store);
        let (_, cards) = deck_with_cards(&store, &["casa"]);
        let id = cards[0].card.id.clone();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || {
                    store
                        .review_card(&id, Quality::GOOD, &SchedulerSettings::default(), Utc::now())
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = store.require_card(&id).unwrap().card.srs_data.unwrap();
        assert_eq!(state.total_reviews, 8);
        assert_eq!(state.correct_streak, 8);
    }

    #[test]
    fn set_schedule_rejects_invalid_state() {
        let (_dir, store) = open_store();
        let (_, cards) = deck_with_cards(&store, &["livro"]);

        let mut state = CardScheduleState::new(Utc::now());
        state.ease_factor = 9.0;
        let err = store
            .set_card_schedule(&cards[0].card.id, Some(state), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::Srs(SrsError::CorruptState { .. })));
    }

    #[test]
    fn import_only_touches_listed_cards() {
        let (_dir, store) = open_store();
        let (deck, cards) = deck_with_cards(&store, &["sol", "lua"]);
        let (reviewed, _) = store
            .review_card(
                &cards[0].card.id,
                Quality::PERFECT,
                &SchedulerSettings::default(),
                Utc::now(),
            )
            .unwrap();

        let backup = srs::export_srs_data(&[reviewed.card.clone()]).unwrap();
        store
            .set_card_schedule(&cards[0].card.id, None, Utc::now())
            .unwrap();

        let changed = store.import_deck_schedule(&deck.id, &backup, Utc::now()).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(
            store.require_card(&cards[0].card.id).unwrap().card.srs_data,
            reviewed.card.srs_data
        );
        assert!(store.require_card(&cards[1].card.id).unwrap().card.srs_data.is_none());
    }

    #[test]
    fn malformed_import_writes_nothing() {
        let (_dir, store) = open_store();
        let (deck, cards) = deck_with_cards(&store, &["mar"]);

        let err = store
            .import_deck_schedule(&deck.id, "{not json", Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::Srs(SrsError::InvalidBackup(_))));
        assert!(store.require_card(&cards[0].card.id).unwrap().card.srs_data.is_none());
    }

    #[test]
    fn schedule_batch_is_all_or_nothing() {
        let (_dir, store) = open_store();
        let (_, cards) = deck_with_cards(&store, &["rio"]);
        let state = CardScheduleState::new(Utc::now());

        let err = store
            .write_schedules(
                &[
                    (cards[0].card.id.clone(), Some(state)),
                    ("vanished".to_string(), None),
                ],
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.require_card(&cards[0].card.id).unwrap().card.srs_data.is_none());
    }
}

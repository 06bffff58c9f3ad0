//! Due-set selection: splits a card collection into new and due-for-review
//! cards under the daily caps, and assembles shuffled study sessions.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::algorithm::initialize_card_at;
use super::types::{Flashcard, SchedulerSettings};
use crate::constants::DEFAULT_SESSION_SIZE;

/// Source of the uniform (Fisher–Yates) shuffle applied to sessions.
pub trait Shuffler {
    fn shuffle<T>(&mut self, items: &mut [T]);
}

/// Shuffles with the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadShuffler;

impl Shuffler for ThreadShuffler {
    fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut rand::thread_rng());
    }
}

/// Deterministic shuffler for tests and reproducible sessions.
#[derive(Debug, Clone)]
pub struct SeededShuffler {
    rng: StdRng,
}

impl SeededShuffler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Shuffler for SeededShuffler {
    fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPartition {
    pub new_cards: Vec<Flashcard>,
    pub review_cards: Vec<Flashcard>,
}

pub fn get_cards_for_review(cards: &[Flashcard], settings: &SchedulerSettings) -> ReviewPartition {
    get_cards_for_review_at(cards, settings, Utc::now())
}

/// Cards without state are initialized (and therefore new). Cards that are
/// neither new nor due are dropped. Caps keep the first N in input order.
pub fn get_cards_for_review_at(
    cards: &[Flashcard],
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
) -> ReviewPartition {
    let mut partition = ReviewPartition::default();

    for card in cards {
        let card = initialize_card_at(card.clone(), now);
        let Some(state) = card.srs_data.as_ref() else {
            continue;
        };
        if state.is_new {
            partition.new_cards.push(card);
        } else if state.is_due(now) {
            partition.review_cards.push(card);
        }
    }

    partition.new_cards.truncate(settings.max_new_cards_per_day);
    partition.review_cards.truncate(settings.max_reviews_per_day);
    partition
}

/// Every due review (up to the review cap) plus new cards filling the
/// remaining slots up to `target_session_size`, shuffled together.
pub fn build_session<S: Shuffler>(
    cards: &[Flashcard],
    target_session_size: usize,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
    shuffler: &mut S,
) -> Vec<Flashcard> {
    let ReviewPartition {
        new_cards,
        review_cards,
    } = get_cards_for_review_at(cards, settings, now);

    let remaining_slots = target_session_size.saturating_sub(review_cards.len());
    let mut session = review_cards;
    session.extend(new_cards.into_iter().take(remaining_slots));

    shuffler.shuffle(&mut session);
    session
}

pub fn get_optimal_study_session(
    cards: &[Flashcard],
    target_minutes: Option<u32>,
    settings: &SchedulerSettings,
) -> Vec<Flashcard> {
    get_optimal_study_session_with(
        cards,
        target_minutes,
        settings,
        Utc::now(),
        &mut ThreadShuffler,
    )
}

/// `target_minutes` is accepted but does not size the session; sessions
/// always target `DEFAULT_SESSION_SIZE` cards.
pub fn get_optimal_study_session_with<S: Shuffler>(
    cards: &[Flashcard],
    target_minutes: Option<u32>,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
    shuffler: &mut S,
) -> Vec<Flashcard> {
    if let Some(minutes) = target_minutes {
        tracing::debug!(target_minutes = minutes, "targetMinutes is inert; using fixed session size");
    }
    build_session(cards, DEFAULT_SESSION_SIZE, settings, now, shuffler)
}

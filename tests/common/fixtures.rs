use axum::http::{Method, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use lingo_backend::srs::{CardScheduleState, Flashcard};
use lingo_backend::store::operations::cards::DeckCard;
use lingo_backend::store::operations::decks::Deck;
use lingo_backend::store::Store;

use super::http::{request, response_json};

pub fn seed_deck(store: &Store, name: &str, card_count: usize) -> (Deck, Vec<DeckCard>) {
    let now = Utc::now();
    let deck = Deck::new(name, "es", now);
    store.create_deck(&deck).expect("create seed deck");

    let cards = (0..card_count)
        .map(|idx| {
            store
                .add_card(
                    &deck.id,
                    Flashcard::new(&format!("palabra-{idx}"), &format!("word-{idx}")),
                    now,
                )
                .expect("add seed card")
        })
        .collect();
    (deck, cards)
}

/// State of a card reviewed `total_reviews` times and due at `next_review_date`.
pub fn reviewed_state(
    interval: i64,
    total_reviews: u32,
    next_review_date: DateTime<Utc>,
) -> CardScheduleState {
    CardScheduleState {
        interval,
        repetitions: total_reviews,
        ease_factor: 2.5,
        next_review_date,
        last_review_date: Some(next_review_date - Duration::days(interval)),
        quality: 4,
        is_new: false,
        total_reviews,
        correct_streak: total_reviews,
        average_quality: 4.0,
    }
}

pub async fn create_deck_via_api(app: &Router, name: &str) -> String {
    let resp = request(
        app,
        Method::POST,
        "/api/decks",
        Some(json!({ "name": name, "languageCode": "pt" })),
        &[],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().expect("deck id").to_string()
}

pub async fn add_cards_via_api(app: &Router, deck_id: &str, pairs: &[(&str, &str)]) -> Vec<Value> {
    let cards: Vec<Value> = pairs
        .iter()
        .map(|(front, back)| json!({ "front": front, "back": back }))
        .collect();
    let resp = request(
        app,
        Method::POST,
        &format!("/api/decks/{deck_id}/cards"),
        Some(json!({ "cards": cards })),
        &[],
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"].as_array().expect("added cards").clone()
}

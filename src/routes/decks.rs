use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_CARD_BATCH, MAX_PAGE_SIZE};
use crate::extractors::{JsonBody, QueryParams};
use crate::response::{created, ok, paginated, AppError};
use crate::srs::{self, Difficulty, Flashcard, SettingsOverride};
use crate::state::AppState;
use crate::store::operations::cards::DeckCard;
use crate::store::operations::decks::Deck;
use crate::validation::{is_valid_language_code, validate_card_text, validate_deck_name};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_decks).post(create_deck))
        .route("/:id", get(get_deck).put(update_deck).delete(delete_deck))
        .route("/:id/cards", get(list_cards).post(add_cards))
        .route("/:id/due", get(due_cards))
        .route("/:id/stats", get(deck_stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_decks(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = q.page.unwrap_or(1).max(1);
    let per_page = q.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let decks = state.store().list_decks()?;
    let total = decks.len() as u64;
    let items: Vec<Deck> = decks
        .into_iter()
        .skip(((page - 1) * per_page) as usize)
        .take(per_page as usize)
        .collect();

    Ok(paginated(items, total, page, per_page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDeckRequest {
    name: String,
    #[serde(default)]
    description: String,
    language_code: String,
    srs_enabled: Option<bool>,
}

async fn create_deck(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateDeckRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_deck_name(&req.name).map_err(|msg| AppError::bad_request("DECK_INVALID_NAME", msg))?;
    if !is_valid_language_code(&req.language_code) {
        return Err(AppError::bad_request(
            "DECK_INVALID_LANGUAGE",
            "languageCode must look like `es` or `pt-BR`",
        ));
    }

    let mut deck = Deck::new(req.name.trim(), &req.language_code, Utc::now());
    deck.description = req.description;
    deck.srs_enabled = req.srs_enabled.unwrap_or(true);

    state.store().create_deck(&deck)?;
    tracing::info!(deck_id = %deck.id, language = %deck.language_code, "Deck created");
    Ok(created(deck))
}

async fn get_deck(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.store().require_deck(&id)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDeckRequest {
    name: Option<String>,
    description: Option<String>,
    language_code: Option<String>,
    srs_enabled: Option<bool>,
}

async fn update_deck(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateDeckRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(name) = &req.name {
        validate_deck_name(name).map_err(|msg| AppError::bad_request("DECK_INVALID_NAME", msg))?;
    }
    if let Some(code) = &req.language_code {
        if !is_valid_language_code(code) {
            return Err(AppError::bad_request(
                "DECK_INVALID_LANGUAGE",
                "languageCode must look like `es` or `pt-BR`",
            ));
        }
    }

    let deck = state.store().update_deck(&id, Utc::now(), |deck| {
        if let Some(name) = &req.name {
            deck.name = name.trim().to_string();
        }
        if let Some(description) = &req.description {
            deck.description = description.clone();
        }
        if let Some(code) = &req.language_code {
            deck.language_code = code.clone();
        }
        if let Some(enabled) = req.srs_enabled {
            deck.srs_enabled = enabled;
        }
    })?;
    Ok(ok(deck))
}

async fn delete_deck(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store().delete_deck(&id)? {
        return Err(AppError::not_found(&format!("deck not found: {id}")));
    }
    Ok(ok(serde_json::json!({ "deleted": true })))
}

/// Cards are returned with a schedule state attached; cards never studied
/// get a fresh one in the response only.
async fn list_cards(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.store().require_deck(&id)?;
    let now = Utc::now();
    let cards: Vec<DeckCard> = state
        .store()
        .list_deck_cards(&id)?
        .into_iter()
        .map(|mut entry| {
            entry.card = srs::initialize_card_at(entry.card, now);
            entry
        })
        .collect();
    Ok(ok(cards))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewCard {
    front: String,
    back: String,
    difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCardsRequest {
    cards: Vec<NewCard>,
}

async fn add_cards(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<AddCardsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.cards.is_empty() {
        return Err(AppError::bad_request("CARDS_EMPTY", "cards must not be empty"));
    }
    if req.cards.len() > MAX_CARD_BATCH {
        return Err(AppError::bad_request(
            "CARDS_TOO_MANY",
            &format!("at most {MAX_CARD_BATCH} cards per request"),
        ));
    }
    for card in &req.cards {
        validate_card_text(&card.front, &card.back)
            .map_err(|msg| AppError::bad_request("CARD_INVALID_TEXT", msg))?;
    }
    state.store().require_deck(&id)?;

    let now = Utc::now();
    let mut added = Vec::with_capacity(req.cards.len());
    for new_card in req.cards {
        let mut card = Flashcard::new(new_card.front.trim(), new_card.back.trim());
        card.difficulty = new_card.difficulty;
        added.push(state.store().add_card(&id, card, now)?);
    }

    tracing::info!(deck_id = %id, added = added.len(), "Cards added");
    Ok(created(added))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DueCardsResponse {
    new_cards: Vec<Flashcard>,
    review_cards: Vec<Flashcard>,
    new_count: usize,
    review_count: usize,
}

async fn due_cards(
    State(state): State<AppState>,
    Path(id): Path<String>,
    QueryParams(patch): QueryParams<SettingsOverride>,
) -> Result<impl IntoResponse, AppError> {
    state.store().require_deck(&id)?;
    let settings = state.scheduler_with(Some(&patch))?;
    let cards = state.store().list_deck_flashcards(&id)?;

    let partition = srs::get_cards_for_review(&cards, &settings);
    Ok(ok(DueCardsResponse {
        new_count: partition.new_cards.len(),
        review_count: partition.review_cards.len(),
        new_cards: partition.new_cards,
        review_cards: partition.review_cards,
    }))
}

async fn deck_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.store().require_deck(&id)?;
    let cards = state.store().list_deck_flashcards(&id)?;
    Ok(ok(srs::calculate_stats(&cards)))
}

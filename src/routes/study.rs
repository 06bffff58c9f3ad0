use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::srs::{self, Flashcard, Quality, ReviewResult, SettingsOverride, SrsStats};
use crate::state::AppState;
use crate::store::operations::cards::DeckCard;
use crate::store::operations::study_sessions::StudySession;
use crate::store::StoreError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/reviews", post(submit_review))
        .route("/sessions/:id/complete", post(complete_session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    deck_id: String,
    target_minutes: Option<u32>,
    settings: Option<SettingsOverride>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionResponse {
    session: StudySession,
    cards: Vec<Flashcard>,
}

async fn start_session(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let deck = state.store().require_deck(&req.deck_id)?;
    if !deck.srs_enabled {
        return Err(AppError::bad_request(
            "SRS_DISABLED",
            "Spaced repetition is disabled for this deck",
        ));
    }
    let settings = state.scheduler_with(req.settings.as_ref())?;
    let now = Utc::now();

    let deck_cards = state.store().list_deck_flashcards(&deck.id)?;
    let cards = srs::get_optimal_study_session(&deck_cards, req.target_minutes, &settings);
    let card_ids = cards.iter().map(|card| card.id.clone()).collect();

    let session = StudySession::new(&deck.id, card_ids, settings, req.target_minutes, now);
    state.store().create_study_session(&session)?;
    state.store().mark_deck_studied(&deck.id, now)?;

    Ok(created(StartSessionResponse { session, cards }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.store().require_study_session(&id)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReviewRequest {
    card_id: String,
    quality: i64,
    #[serde(default)]
    time_spent: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReviewResponse {
    card: DeckCard,
    review_result: ReviewResult,
    reviewed: usize,
    remaining: usize,
}

async fn submit_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<SubmitReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quality = Quality::new(req.quality)?;
    let session = state.store().require_study_session(&id)?;
    if !session.contains_card(&req.card_id) {
        return Err(AppError::bad_request(
            "CARD_NOT_IN_SESSION",
            &format!("card {} is not part of session {}", req.card_id, id),
        ));
    }
    if session.is_reviewed(&req.card_id) {
        return Err(already_reviewed(&req.card_id, &id));
    }

    let (session, card, review_result) = state
        .store()
        .review_session_card(&id, &req.card_id, quality, req.time_spent, Utc::now())
        .map_err(|e| match e {
            StoreError::Conflict { .. } => already_reviewed(&req.card_id, &id),
            other => other.into(),
        })?;

    Ok(ok(SubmitReviewResponse {
        card,
        review_result,
        reviewed: session.reviewed_cards.len(),
        remaining: session.remaining(),
    }))
}

fn already_reviewed(card_id: &str, session_id: &str) -> AppError {
    AppError::conflict(
        "CARD_ALREADY_REVIEWED",
        &format!("card {card_id} was already reviewed in session {session_id}"),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteSessionResponse {
    session_id: String,
    deck_id: String,
    correct_count: u32,
    incorrect_count: u32,
    reviewed_cards: Vec<ReviewResult>,
    duration_secs: i64,
    stats: SrsStats,
}

async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.store().complete_study_session(&id)?;
    let cards = state.store().list_deck_flashcards(&session.deck_id)?;

    Ok(ok(CompleteSessionResponse {
        duration_secs: (Utc::now() - session.started_at).num_seconds().max(0),
        stats: srs::calculate_stats(&cards),
        session_id: session.id,
        deck_id: session.deck_id,
        correct_count: session.correct_count,
        incorrect_count: session.incorrect_count,
        reviewed_cards: session.reviewed_cards,
    }))
}

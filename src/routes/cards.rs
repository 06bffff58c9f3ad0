use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::extractors::{JsonBody, QueryParams};
use crate::response::{ok, AppError};
use crate::srs::{self, Quality, ReviewResult, SettingsOverride};
use crate::state::AppState;
use crate::store::operations::cards::{CardPatch, DeckCard};
use crate::validation::validate_card_text;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_card).put(update_card).delete(delete_card))
        .route("/:id/preview", get(preview_card))
        .route("/:id/review", post(review_card))
}

async fn get_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.store().require_card(&id)?))
}

async fn update_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<CardPatch>,
) -> Result<impl IntoResponse, AppError> {
    let current = state.store().require_card(&id)?;
    let front = patch.front.as_deref().unwrap_or(&current.card.front);
    let back = patch.back.as_deref().unwrap_or(&current.card.back);
    validate_card_text(front, back).map_err(|msg| AppError::bad_request("CARD_INVALID_TEXT", msg))?;

    let patch = CardPatch {
        front: patch.front.map(|s| s.trim().to_string()),
        back: patch.back.map(|s| s.trim().to_string()),
        difficulty: patch.difficulty,
    };
    Ok(ok(state.store().update_card_content(&id, &patch, Utc::now())?))
}

async fn delete_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state.store().delete_card(&id, Utc::now())? {
        return Err(AppError::not_found(&format!("card not found: {id}")));
    }
    Ok(ok(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewOption {
    quality: u8,
    interval: i64,
    label: String,
}

async fn preview_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    QueryParams(patch): QueryParams<SettingsOverride>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.scheduler_with(Some(&patch))?;
    let entry = state.store().require_card(&id)?;

    let intervals = srs::preview_intervals(&entry.card, &settings, Utc::now())?;
    let options: Vec<PreviewOption> = [1_u8, 3, 4, 5]
        .into_iter()
        .zip(intervals)
        .map(|(quality, interval)| PreviewOption {
            quality,
            interval,
            label: srs::format_interval(interval),
        })
        .collect();
    Ok(ok(options))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    /// Kept as a plain integer so out-of-range ratings surface as
    /// `INVALID_QUALITY_RATING` rather than a body decode error.
    quality: i64,
    #[serde(default)]
    time_spent: u32,
    settings: Option<SettingsOverride>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewResponse {
    card: DeckCard,
    review_result: ReviewResult,
}

async fn review_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quality = Quality::new(req.quality)?;
    let settings = state.scheduler_with(req.settings.as_ref())?;

    let (card, review_result) = state
        .store()
        .review_card(&id, quality, &settings, Utc::now())?;

    Ok(ok(ReviewResponse {
        card,
        review_result: review_result.with_time_spent(req.time_spent),
    }))
}

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;

use crate::response::{ok, AppError};
use crate::srs;
use crate::state::AppState;

/// Schedule backup endpoints, mounted under `/api/decks`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/srs-export", get(export_schedule))
        .route("/:id/srs-import", post(import_schedule))
}

/// Returns the bare `[{cardId, srsData}]` document, not the usual envelope,
/// so the file can be fed back to the import endpoint unchanged.
async fn export_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deck = state.store().require_deck(&id)?;
    let cards = state.store().list_deck_flashcards(&deck.id)?;
    let body = srs::export_srs_data(&cards)?;

    tracing::info!(deck_id = %deck.id, cards = cards.len(), "Schedule exported");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"srs-{}.json\"", deck.id),
            ),
        ],
        body,
    ))
}

async fn import_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    state.store().require_deck(&id)?;
    let updated = state.store().import_deck_schedule(&id, &body, Utc::now())?;
    Ok(ok(serde_json::json!({ "updated": updated })))
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::srs::{self, Quality, ReviewResult, SchedulerSettings};
use crate::store::operations::cards::DeckCard;
use crate::store::{keys, map_tx_error, tx_abort, Store, StoreError};

/// A study run over a fixed set of cards. The review log lives only as long
/// as the session does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: String,
    pub deck_id: String,
    pub card_ids: Vec<String>,
    pub settings: SchedulerSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_minutes: Option<u32>,
    #[serde(default)]
    pub reviewed_cards: Vec<ReviewResult>,
    #[serde(default)]
    pub correct_count: u32,
    #[serde(default)]
    pub incorrect_count: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudySession {
    pub fn new(
        deck_id: &str,
        card_ids: Vec<String>,
        settings: SchedulerSettings,
        target_minutes: Option<u32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            deck_id: deck_id.to_string(),
            card_ids,
            settings,
            target_minutes,
            reviewed_cards: Vec::new(),
            correct_count: 0,
            incorrect_count: 0,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn contains_card(&self, card_id: &str) -> bool {
        self.card_ids.iter().any(|id| id == card_id)
    }

    pub fn is_reviewed(&self, card_id: &str) -> bool {
        self.reviewed_cards.iter().any(|r| r.card_id == card_id)
    }

    /// Session cards that have not been rated yet.
    pub fn remaining(&self) -> usize {
        self.card_ids
            .iter()
            .filter(|id| !self.is_reviewed(id))
            .count()
    }

    /// Each session card takes exactly one rating.
    fn check_reviewable(&self, card_id: &str) -> Result<(), StoreError> {
        if !self.contains_card(card_id) {
            return Err(StoreError::Validation(format!(
                "card {card_id} is not part of session {}",
                self.id
            )));
        }
        if self.is_reviewed(card_id) {
            return Err(StoreError::Conflict {
                entity: "session_review".to_string(),
                key: card_id.to_string(),
            });
        }
        Ok(())
    }

    fn record(&mut self, result: ReviewResult, now: DateTime<Utc>) {
        if result.was_correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
        self.reviewed_cards.push(result);
        self.updated_at = now;
    }
}

impl Store {
    pub fn create_study_session(&self, session: &StudySession) -> Result<(), StoreError> {
        let key = keys::study_session_key(&session.id);
        self.study_sessions
            .insert(key.as_bytes(), Self::serialize(session)?)?;
        tracing::info!(
            session_id = %session.id,
            deck_id = %session.deck_id,
            cards = session.card_ids.len(),
            "Study session created"
        );
        Ok(())
    }

    pub fn get_study_session(&self, session_id: &str) -> Result<Option<StudySession>, StoreError> {
        let key = keys::study_session_key(session_id);
        match self.study_sessions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn require_study_session(&self, session_id: &str) -> Result<StudySession, StoreError> {
        self.get_study_session(session_id)?
            .ok_or_else(|| StoreError::not_found("study_session", session_id))
    }

    /// Rates one card of a session. The card state and the session log are
    /// written in a single transaction, so a card is rescheduled at most
    /// once per session even under repeated or concurrent submissions.
    pub fn review_session_card(
        &self,
        session_id: &str,
        card_id: &str,
        quality: Quality,
        time_spent: u32,
        now: DateTime<Utc>,
    ) -> Result<(StudySession, DeckCard, ReviewResult), StoreError> {
        let session_key = keys::study_session_key(session_id);
        let card_key = keys::card_key(card_id);

        let (session, entry, review_result) = (&self.study_sessions, &self.cards)
            .transaction(|(tx_sessions, tx_cards)| {
                let Some(raw_session) = tx_sessions.get(session_key.as_bytes())? else {
                    return Err(tx_abort(StoreError::not_found("study_session", session_id)));
                };
                let mut session: StudySession =
                    serde_json::from_slice(&raw_session).map_err(tx_abort)?;
                session.check_reviewable(card_id).map_err(tx_abort)?;

                let Some(raw_entry) = tx_cards.get(card_key.as_bytes())? else {
                    return Err(tx_abort(StoreError::not_found("card", card_id)));
                };
                let mut entry: DeckCard = serde_json::from_slice(&raw_entry).map_err(tx_abort)?;
                let outcome =
                    srs::calculate_next_review_at(&entry.card, quality, &session.settings, now)
                        .map_err(tx_abort)?;
                entry.card = outcome.updated_card;
                entry.updated_at = now;
                let review_result = outcome.review_result.with_time_spent(time_spent);
                session.record(review_result.clone(), now);

                let entry_bytes = serde_json::to_vec(&entry).map_err(tx_abort)?;
                let session_bytes = serde_json::to_vec(&session).map_err(tx_abort)?;
                tx_cards.insert(card_key.as_bytes(), entry_bytes)?;
                tx_sessions.insert(session_key.as_bytes(), session_bytes)?;
                Ok((session, entry, review_result))
            })
            .map_err(map_tx_error)?;

        tracing::info!(
            session_id,
            card_id,
            quality = quality.value(),
            new_interval = review_result.new_interval,
            remaining = session.remaining(),
            "Session card reviewed"
        );
        Ok((session, entry, review_result))
    }

    /// Removes the session and hands back its final log.
    pub fn complete_study_session(&self, session_id: &str) -> Result<StudySession, StoreError> {
        let key = keys::study_session_key(session_id);
        let raw = self
            .study_sessions
            .remove(key.as_bytes())?
            .ok_or_else(|| StoreError::not_found("study_session", session_id))?;
        let session: StudySession = Self::deserialize(&raw)?;

        tracing::info!(
            session_id,
            deck_id = %session.deck_id,
            reviewed = session.reviewed_cards.len(),
            correct = session.correct_count,
            incorrect = session.incorrect_count,
            "Study session completed"
        );
        Ok(session)
    }

    /// Drops sessions untouched for longer than `ttl`.
    pub fn cleanup_expired_sessions(
        &self,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let cutoff = now - ttl;
        let mut removed = 0;
        for item in self.study_sessions.iter() {
            let (key, value) = item?;
            let session: StudySession = match Self::deserialize(&value) {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(error = %e, "Removing unreadable study session");
                    self.study_sessions.remove(&key)?;
                    removed += 1;
                    continue;
                }
            };
            if session.updated_at < cutoff {
                self.study_sessions.remove(&key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Expired study sessions removed");
        }
        Ok(removed)
    }
}

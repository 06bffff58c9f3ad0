use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::types::{CardScheduleState, Flashcard, INITIAL_EASE_FACTOR};
use crate::constants::MASTERED_INTERVAL_DAYS;

/// Exhaustive classification of a scheduled card. Only `New`, `Due` and
/// `Mastered` have their own counter in `SrsStats`; `Learning` cards count
/// toward `total_cards` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardBucket {
    New,
    Due,
    Mastered,
    Learning,
}

pub fn classify(state: &CardScheduleState, now: DateTime<Utc>) -> CardBucket {
    if state.is_new {
        CardBucket::New
    } else if state.is_due(now) {
        CardBucket::Due
    } else if state.interval >= MASTERED_INTERVAL_DAYS {
        CardBucket::Mastered
    } else {
        CardBucket::Learning
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsStats {
    pub total_cards: usize,
    pub new_cards: usize,
    pub review_cards: usize,
    pub mastered_cards: usize,
    pub average_ease_factor: f64,
    /// Sum of current correct streaks over sum of reviews, as a percentage.
    pub retention_rate: f64,
    pub daily_reviews: usize,
    /// Not tracked yet; always 0.
    pub streak_days: u32,
}

pub fn calculate_stats(cards: &[Flashcard]) -> SrsStats {
    calculate_stats_at(cards, Local::now())
}

/// `now` carries the timezone whose midnight bounds `daily_reviews`.
pub fn calculate_stats_at<Tz: TimeZone>(cards: &[Flashcard], now: DateTime<Tz>) -> SrsStats {
    let today = start_of_day(&now);
    let now = now.with_timezone(&Utc);

    let mut total_cards = 0_usize;
    let mut new_cards = 0_usize;
    let mut review_cards = 0_usize;
    let mut mastered_cards = 0_usize;
    let mut daily_reviews = 0_usize;
    let mut ease_sum = 0.0_f64;
    let mut streak_sum = 0_u64;
    let mut review_sum = 0_u64;

    for state in cards.iter().filter_map(|c| c.srs_data.as_ref()) {
        total_cards += 1;
        match classify(state, now) {
            CardBucket::New => new_cards += 1,
            CardBucket::Due => review_cards += 1,
            CardBucket::Mastered => mastered_cards += 1,
            CardBucket::Learning => {}
        }

        ease_sum += state.ease_factor;
        streak_sum += u64::from(state.correct_streak);
        review_sum += u64::from(state.total_reviews);

        if state.last_review_date.is_some_and(|d| d >= today) {
            daily_reviews += 1;
        }
    }

    let average_ease_factor = if total_cards > 0 {
        ease_sum / total_cards as f64
    } else {
        INITIAL_EASE_FACTOR
    };
    let retention_rate = if review_sum > 0 {
        streak_sum as f64 / review_sum as f64 * 100.0
    } else {
        0.0
    };

    SrsStats {
        total_cards,
        new_cards,
        review_cards,
        mastered_cards,
        average_ease_factor,
        retention_rate,
        daily_reviews,
        streak_days: 0,
    }
}

fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

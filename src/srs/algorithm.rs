//! SM-2 variant used for scheduling reviews.
//!
//! Passing reviews (quality >= 3) grow the interval; quality 5 applies the
//! easy bonus and raises the ease factor, quality 3 applies the hard penalty
//! and lowers it. A lapse (quality < 3) resets the card to a one-day interval.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::{
    CardScheduleState, Flashcard, Quality, ReviewResult, SchedulerSettings, SrsError,
    MAX_EASE_FACTOR, MIN_EASE_FACTOR,
};

const EASY_EASE_STEP: f64 = 0.15;
const HARD_EASE_STEP: f64 = 0.15;
const LAPSE_EASE_STEP: f64 = 0.2;

/// Interval used for the second successful review of a card.
const SECOND_REVIEW_INTERVAL: i64 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub updated_card: Flashcard,
    pub review_result: ReviewResult,
}

/// Attach a fresh schedule state if the card has none. Cards that already
/// carry state are returned unchanged.
pub fn initialize_card(card: Flashcard) -> Flashcard {
    initialize_card_at(card, Utc::now())
}

pub fn initialize_card_at(mut card: Flashcard, now: DateTime<Utc>) -> Flashcard {
    if card.srs_data.is_none() {
        card.srs_data = Some(CardScheduleState::new(now));
    }
    card
}

pub fn calculate_next_review(
    card: &Flashcard,
    quality: Quality,
    settings: &SchedulerSettings,
) -> Result<ReviewOutcome, SrsError> {
    calculate_next_review_at(card, quality, settings, Utc::now())
}

/// Apply one review to `card`. Pure in `(state, quality, settings, now)`;
/// the caller persists the returned card.
pub fn calculate_next_review_at(
    card: &Flashcard,
    quality: Quality,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome, SrsError> {
    settings.validate()?;
    let state = match &card.srs_data {
        Some(existing) => {
            existing.validate()?;
            existing.clone()
        }
        None => CardScheduleState::new(now),
    };

    let q = quality.value();
    let was_correct = quality.is_correct();
    let previous_interval = state.interval;

    let reviews = f64::from(state.total_reviews);
    let average_quality = (state.average_quality * reviews + f64::from(q)) / (reviews + 1.0);

    let (interval, repetitions, ease_factor) = if was_correct {
        let (base_interval, repetitions) = if state.is_new {
            let graduation = if q == 5 {
                settings.easy_interval
            } else {
                settings.graduating_interval
            };
            (graduation, 1)
        } else {
            let interval = match state.repetitions {
                0 => 1,
                1 => SECOND_REVIEW_INTERVAL,
                _ => scale(state.interval, state.ease_factor),
            };
            (interval, state.repetitions.saturating_add(1))
        };

        match q {
            5 => (
                scale(base_interval, settings.easy_bonus),
                repetitions,
                (state.ease_factor + EASY_EASE_STEP).min(MAX_EASE_FACTOR),
            ),
            3 => (
                scale(base_interval, settings.hard_penalty),
                repetitions,
                (state.ease_factor - HARD_EASE_STEP).max(MIN_EASE_FACTOR),
            ),
            _ => (base_interval, repetitions, state.ease_factor),
        }
    } else {
        (
            1,
            0,
            (state.ease_factor - LAPSE_EASE_STEP).max(MIN_EASE_FACTOR),
        )
    };

    let new_interval = interval.clamp(settings.minimum_interval, settings.maximum_interval);

    let updated_state = CardScheduleState {
        interval: new_interval,
        repetitions,
        ease_factor,
        next_review_date: now + Duration::days(new_interval),
        last_review_date: Some(now),
        quality: q,
        is_new: false,
        total_reviews: state.total_reviews.saturating_add(1),
        correct_streak: if was_correct {
            state.correct_streak.saturating_add(1)
        } else {
            0
        },
        average_quality,
    };

    let review_result = ReviewResult {
        card_id: card.id.clone(),
        quality,
        time_spent: 0,
        was_correct,
        previous_interval,
        new_interval,
        review_date: now,
    };

    tracing::debug!(
        card_id = %card.id,
        quality = q,
        previous_interval,
        new_interval,
        ease_factor,
        "Review scheduled"
    );

    Ok(ReviewOutcome {
        updated_card: Flashcard {
            srs_data: Some(updated_state),
            ..card.clone()
        },
        review_result,
    })
}

fn scale(interval: i64, factor: f64) -> i64 {
    (interval as f64 * factor).round() as i64
}

/// Intervals the four rating buttons would produce: Again (1), Hard (3),
/// Good (4), Easy (5).
pub fn preview_intervals(
    card: &Flashcard,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
) -> Result<[i64; 4], SrsError> {
    let mut out = [0_i64; 4];
    for (slot, q) in out.iter_mut().zip([1_i64, 3, 4, 5]) {
        let quality = Quality::new(q)?;
        *slot = calculate_next_review_at(card, quality, settings, now)?
            .review_result
            .new_interval;
    }
    Ok(out)
}

pub fn format_interval(days: i64) -> String {
    match days {
        d if d <= 0 => "now".to_string(),
        d if d < 7 => format!("{d}d"),
        d if d < 30 => format!("{}w", d / 7),
        d if d < 365 => format!("{}mo", d / 30),
        d => format!("{}y", d / 365),
    }
}

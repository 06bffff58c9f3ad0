use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_EASE_FACTOR: f64 = 2.5;
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Hard ceiling for any interval, ~100 years.
pub const MAX_INTERVAL_DAYS: i64 = 36_500;

const EASE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SrsError {
    #[error("invalid quality rating {0}: expected an integer in 0..=5")]
    InvalidQualityRating(i64),
    #[error("invalid scheduler settings: {0}")]
    InvalidSettings(String),
    #[error("corrupt schedule state: {field} {reason}")]
    CorruptState { field: &'static str, reason: String },
    #[error("invalid backup: {0}")]
    InvalidBackup(String),
}

/// Self-assessed recall quality on the SM-2 scale.
///
/// - 0: complete blackout
/// - 1: incorrect, but recognized the answer
/// - 2: incorrect, but the answer seemed easy
/// - 3: correct with serious difficulty
/// - 4: correct after hesitation
/// - 5: perfect recall
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const BLACKOUT: Quality = Quality(0);
    pub const HARD: Quality = Quality(3);
    pub const GOOD: Quality = Quality(4);
    pub const PERFECT: Quality = Quality(5);

    pub fn new(value: i64) -> Result<Self, SrsError> {
        if (0..=5).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(SrsError::InvalidQualityRating(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_correct(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<i64> for Quality {
    type Error = SrsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(value: Quality) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Per-card scheduling memory. Field names match the `{cardId, srsData}`
/// backup format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardScheduleState {
    /// Days until the next review, 0 before the first one.
    pub interval: i64,
    /// Consecutive successful reviews since the last lapse.
    pub repetitions: u32,
    pub ease_factor: f64,
    pub next_review_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review_date: Option<DateTime<Utc>>,
    /// Quality of the most recent review.
    #[serde(default)]
    pub quality: u8,
    pub is_new: bool,
    pub total_reviews: u32,
    pub correct_streak: u32,
    pub average_quality: f64,
}

impl CardScheduleState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            interval: 0,
            repetitions: 0,
            ease_factor: INITIAL_EASE_FACTOR,
            next_review_date: now,
            last_review_date: None,
            quality: 0,
            is_new: true,
            total_reviews: 0,
            correct_streak: 0,
            average_quality: 0.0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }

    /// Integrity check for state read back from storage or a backup.
    /// Out-of-range values are reported, never clamped.
    pub fn validate(&self) -> Result<(), SrsError> {
        if self.interval < 0 {
            return Err(corrupt("interval", format!("is negative ({})", self.interval)));
        }
        if self.interval > MAX_INTERVAL_DAYS {
            return Err(corrupt(
                "interval",
                format!("exceeds {MAX_INTERVAL_DAYS} days ({})", self.interval),
            ));
        }
        if self.total_reviews > 0 && self.interval == 0 {
            return Err(corrupt("interval", "is 0 on a reviewed card".to_string()));
        }
        if !self.ease_factor.is_finite()
            || self.ease_factor < MIN_EASE_FACTOR - EASE_TOLERANCE
            || self.ease_factor > MAX_EASE_FACTOR + EASE_TOLERANCE
        {
            return Err(corrupt(
                "easeFactor",
                format!(
                    "outside [{MIN_EASE_FACTOR}, {MAX_EASE_FACTOR}] ({})",
                    self.ease_factor
                ),
            ));
        }
        if self.is_new != (self.total_reviews == 0) {
            return Err(corrupt(
                "isNew",
                format!(
                    "is {} but totalReviews is {}",
                    self.is_new, self.total_reviews
                ),
            ));
        }
        if self.quality > 5 {
            return Err(corrupt("quality", format!("outside 0..=5 ({})", self.quality)));
        }
        if !self.average_quality.is_finite() || !(0.0..=5.0).contains(&self.average_quality) {
            return Err(corrupt(
                "averageQuality",
                format!("outside [0, 5] ({})", self.average_quality),
            ));
        }
        if self.correct_streak > self.total_reviews {
            return Err(corrupt(
                "correctStreak",
                format!(
                    "({}) exceeds totalReviews ({})",
                    self.correct_streak, self.total_reviews
                ),
            ));
        }
        Ok(())
    }
}

fn corrupt(field: &'static str, reason: String) -> SrsError {
    SrsError::CorruptState { field, reason }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs_data: Option<CardScheduleState>,
}

impl Flashcard {
    pub fn new(front: &str, back: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            front: front.to_string(),
            back: back.to_string(),
            difficulty: None,
            srs_data: None,
        }
    }
}

/// One review event. Kept in the session log only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub card_id: String,
    pub quality: Quality,
    /// Seconds spent on the card, supplied by the caller.
    pub time_spent: u32,
    pub was_correct: bool,
    pub previous_interval: i64,
    pub new_interval: i64,
    pub review_date: DateTime<Utc>,
}

impl ReviewResult {
    pub fn with_time_spent(mut self, seconds: u32) -> Self {
        self.time_spent = seconds;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    pub max_new_cards_per_day: usize,
    pub max_reviews_per_day: usize,
    pub easy_bonus: f64,
    pub hard_penalty: f64,
    pub graduating_interval: i64,
    pub easy_interval: i64,
    pub maximum_interval: i64,
    pub minimum_interval: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_new_cards_per_day: 20,
            max_reviews_per_day: 100,
            easy_bonus: 1.3,
            hard_penalty: 0.8,
            graduating_interval: 1,
            easy_interval: 4,
            maximum_interval: MAX_INTERVAL_DAYS,
            minimum_interval: 1,
        }
    }
}

impl SchedulerSettings {
    pub fn validate(&self) -> Result<(), SrsError> {
        if self.minimum_interval < 1 {
            return Err(invalid_settings("minimumInterval must be at least 1"));
        }
        if self.maximum_interval > MAX_INTERVAL_DAYS {
            return Err(invalid_settings("maximumInterval must not exceed 36500"));
        }
        if self.minimum_interval > self.maximum_interval {
            return Err(invalid_settings(
                "minimumInterval must not exceed maximumInterval",
            ));
        }
        if self.graduating_interval < 1 || self.easy_interval < 1 {
            return Err(invalid_settings(
                "graduatingInterval and easyInterval must be at least 1",
            ));
        }
        if !(self.easy_bonus.is_finite() && self.easy_bonus > 0.0) {
            return Err(invalid_settings("easyBonus must be a positive number"));
        }
        if !(self.hard_penalty.is_finite() && self.hard_penalty > 0.0) {
            return Err(invalid_settings("hardPenalty must be a positive number"));
        }
        Ok(())
    }

    /// Layer a per-call override on top of these settings.
    pub fn with_override(&self, patch: &SettingsOverride) -> SchedulerSettings {
        SchedulerSettings {
            max_new_cards_per_day: patch
                .max_new_cards_per_day
                .unwrap_or(self.max_new_cards_per_day),
            max_reviews_per_day: patch
                .max_reviews_per_day
                .unwrap_or(self.max_reviews_per_day),
            easy_bonus: patch.easy_bonus.unwrap_or(self.easy_bonus),
            hard_penalty: patch.hard_penalty.unwrap_or(self.hard_penalty),
            graduating_interval: patch
                .graduating_interval
                .unwrap_or(self.graduating_interval),
            easy_interval: patch.easy_interval.unwrap_or(self.easy_interval),
            maximum_interval: patch.maximum_interval.unwrap_or(self.maximum_interval),
            minimum_interval: patch.minimum_interval.unwrap_or(self.minimum_interval),
        }
    }
}

fn invalid_settings(message: &str) -> SrsError {
    SrsError::InvalidSettings(message.to_string())
}

/// Partial settings supplied with a single request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOverride {
    pub max_new_cards_per_day: Option<usize>,
    pub max_reviews_per_day: Option<usize>,
    pub easy_bonus: Option<f64>,
    pub hard_penalty: Option<f64>,
    pub graduating_interval: Option<i64>,
    pub easy_interval: Option<i64>,
    pub maximum_interval: Option<i64>,
    pub minimum_interval: Option<i64>,
}

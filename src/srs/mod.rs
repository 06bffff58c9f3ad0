//! Spaced-repetition scheduling core.
//!
//! Pure, synchronous functions over card snapshots: the caller owns the
//! cards, passes the full prior state into every call and persists whatever
//! comes back. Nothing here performs I/O or keeps state between calls.

pub mod algorithm;
pub mod backup;
pub mod selector;
pub mod stats;
pub mod types;

pub use algorithm::{
    calculate_next_review, calculate_next_review_at, format_interval, initialize_card,
    initialize_card_at, preview_intervals, ReviewOutcome,
};
pub use backup::{export_srs_data, import_srs_data, SrsBackupEntry};
pub use selector::{
    build_session, get_cards_for_review, get_cards_for_review_at, get_optimal_study_session,
    get_optimal_study_session_with, ReviewPartition, SeededShuffler, Shuffler, ThreadShuffler,
};
pub use stats::{calculate_stats, calculate_stats_at, classify, CardBucket, SrsStats};
pub use types::{
    CardScheduleState, Difficulty, Flashcard, Quality, ReviewResult, SchedulerSettings,
    SettingsOverride, SrsError,
};

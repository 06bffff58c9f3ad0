pub mod cards;
pub mod decks;
pub mod study_sessions;

pub const DECKS: &str = "decks";
pub const CARDS: &str = "cards";
pub const DECK_CARDS: &str = "deck_cards";
pub const STUDY_SESSIONS: &str = "study_sessions";
pub const META: &str = "meta";

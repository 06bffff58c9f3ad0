pub fn deck_key(deck_id: &str) -> String {
    deck_id.to_string()
}

pub fn card_key(card_id: &str) -> String {
    card_id.to_string()
}

/// Zero-padded position keeps a deck's cards in insertion order.
pub fn deck_card_key(deck_id: &str, position: u64) -> String {
    format!("{}:{:020}", deck_id, position)
}

pub fn deck_card_prefix(deck_id: &str) -> String {
    format!("{}:", deck_id)
}

pub fn study_session_key(session_id: &str) -> String {
    session_id.to_string()
}

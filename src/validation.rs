//! Input checks shared by the deck and card routes.

use crate::constants::{MAX_CARD_TEXT_LEN, MAX_DECK_NAME_LEN};

/// Deck names: 1-120 characters after trimming.
pub fn validate_deck_name(name: &str) -> Result<(), &'static str> {
    let char_count = name.trim().chars().count();
    if char_count == 0 {
        return Err("Deck name must not be empty");
    }
    if char_count > MAX_DECK_NAME_LEN {
        return Err("Deck name must be at most 120 characters");
    }
    Ok(())
}

/// ISO 639-1 style code, optionally with a region: `es`, `pt-BR`.
pub fn is_valid_language_code(code: &str) -> bool {
    let mut parts = code.splitn(2, '-');
    let language = parts.next().unwrap_or_default();
    let language_ok = (2..=3).contains(&language.len())
        && language.bytes().all(|b| b.is_ascii_lowercase());
    let region_ok = parts.next().map_or(true, |region| {
        region.len() == 2 && region.bytes().all(|b| b.is_ascii_uppercase())
    });
    language_ok && region_ok
}

/// Card faces must carry text and stay within `MAX_CARD_TEXT_LEN` characters.
pub fn validate_card_text(front: &str, back: &str) -> Result<(), &'static str> {
    if front.trim().is_empty() || back.trim().is_empty() {
        return Err("Card front and back must not be empty");
    }
    if front.chars().count() > MAX_CARD_TEXT_LEN || back.chars().count() > MAX_CARD_TEXT_LEN {
        return Err("Card text must be at most 2000 characters per side");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_name_trimmed_before_length_check() {
        assert!(validate_deck_name("  Spanish basics ").is_ok());
        assert!(validate_deck_name("   ").is_err());
    }

    #[test]
    fn deck_name_counts_characters_not_bytes() {
        assert!(validate_deck_name(&"日".repeat(120)).is_ok());
        assert!(validate_deck_name(&"日".repeat(121)).is_err());
    }

    #[test]
    fn language_codes() {
        assert!(is_valid_language_code("es"));
        assert!(is_valid_language_code("pt-BR"));
        assert!(is_valid_language_code("haw"));
        assert!(!is_valid_language_code("ES"));
        assert!(!is_valid_language_code("pt-br"));
        assert!(!is_valid_language_code(""));
    }

    #[test]
    fn card_text_limits() {
        assert!(validate_card_text("hola", "hello").is_ok());
        assert!(validate_card_text("", "hello").is_err());
        assert!(validate_card_text("hola", &"a".repeat(2_001)).is_err());
    }
}

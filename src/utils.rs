/// Lowercase, strip non-alphanumerics and join words with hyphens
pub fn slugify(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Parse an integer that may carry thousands separators ("1,200")
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parse a rating and clamp it into 0.0..=5.0
pub fn parse_rating(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(clamp_rating(value))
}

/// Ratings above 5.0 come from digits fused onto the value (e.g. "Studio 54.5")
pub fn clamp_rating(value: f64) -> f64 {
    value.clamp(0.0, 5.0)
}

/// Endings a keyword may carry and still count, e.g. "outdoor" in "outdoors"
const PLURAL_ENDINGS: [&str; 2] = ["es", "s"];

/// Does `text` contain `phrase` bounded by non-alphanumeric characters?
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    contains_word_form(text, phrase, &[])
}

/// Like `contains_phrase`, but the phrase may also end in a plural ending.
///
/// "park" matches "parks" and never "parking".
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    contains_word_form(text, keyword, &PLURAL_ENDINGS)
}

fn contains_word_form(text: &str, phrase: &str, endings: &[&str]) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric();
    text.match_indices(phrase).any(|(start, _)| {
        if text[..start].chars().next_back().is_some_and(is_word) {
            return false;
        }
        let rest = &text[start + phrase.len()..];
        std::iter::once("")
            .chain(endings.iter().copied())
            .filter_map(|ending| rest.strip_prefix(ending))
            .any(|tail| !tail.chars().next().is_some_and(is_word))
    })
}

use crate::utils::contains_phrase;

/// Splits text into paragraphs based on empty lines
pub fn split_into_paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current_paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            // An empty line marks a paragraph boundary
            if !current_paragraph.is_empty() {
                paragraphs.push(current_paragraph);
                current_paragraph = Vec::new();
            }
        } else {
            current_paragraph.push(trimmed);
        }
    }

    if !current_paragraph.is_empty() {
        paragraphs.push(current_paragraph);
    }

    paragraphs
}

/// Normalizes whitespace within a single line or paragraph
pub fn normalize_whitespace_in_segment(segment: &str) -> String {
    segment.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes free text while keeping paragraph breaks as exactly one blank line
pub fn clean_block(text: &str) -> String {
    split_into_paragraphs(text)
        .iter()
        .map(|para| normalize_whitespace_in_segment(&para.join(" ")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Text fragments that mark page chrome rather than a venue card
const BOILERPLATE: [&str; 14] = [
    "sign up",
    "log in",
    "we use cookies",
    "accept cookies",
    "cookie policy",
    "cookie settings",
    "privacy policy",
    "terms of use",
    "advertisement",
    "newsletter",
    "get the app",
    "all rights reserved",
    "sort by",
    "filter by",
];

/// True if the text reads like navigation, legal or promo chrome.
///
/// Phrases only count as whole words, so "The Log Inn" is not "log in".
pub fn is_boilerplate(text: &str) -> bool {
    let lowered = normalize_whitespace_in_segment(&text.to_lowercase());
    BOILERPLATE
        .iter()
        .any(|phrase| contains_phrase(&lowered, phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_paragraphs() {
        assert_eq!(split_into_paragraphs("").len(), 0);

        let result = split_into_paragraphs("Line 1a\nLine 1b\n\n\n\nLine 2a");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], vec!["Line 1a", "Line 1b"]);
        assert_eq!(result[1], vec!["Line 2a"]);
    }

    #[test]
    fn test_clean_block() {
        let input = "  A rustic   barn\n on 40 acres.\n\n\n\n  Open year round. ";
        assert_eq!(clean_block(input), "A rustic barn on 40 acres.\n\nOpen year round.");
        assert_eq!(clean_block("   \n\t  "), "");
    }

    #[test]
    fn test_boilerplate() {
        assert!(is_boilerplate("Log in to save your favorites"));
        assert!(is_boilerplate("We use cookies"));
        assert!(is_boilerplate("Read our Cookie   Policy"));
        assert!(!is_boilerplate("Lakeview Barn 4.5 (120) Springfield, IL"));
        assert!(!is_boilerplate("The Log Inn 4.6(40) Gatlinburg, TN"));
        assert!(!is_boilerplate("Fortune Cookie Hall 4.2(9) Austin, TX"));
    }
}

//! Heuristic parsing of the markdown reply format.
//!
//! Format contract (v1, matches the bundled system prompt):
//!
//! ```text
//! CareBridge AI: <answer>
//!
//! <disclaimer>
//!
//! Suggested follow-up questions:
//! - <question>
//! - <question>
//! - <question>
//! ```

use crate::models::chat::ParsedResponse;

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
pub const LEGACY_MESSAGE_PREFIX: &str = "CareBridge AI:";
pub const FOLLOW_UP_MARKER: &str = "Suggested";

const SCOPE_REFUSAL_PHRASES: [&str; 3] = [
    "sorry",
    "can only help",
    "healthcare-related questions",
];

/// True for the prompt's out-of-scope refusal reply.
pub fn is_scope_refusal(raw: &str) -> bool {
    SCOPE_REFUSAL_PHRASES.iter().all(|phrase| raw.contains(phrase))
}

pub fn parse_legacy(raw: &str) -> ParsedResponse {
    let paragraphs: Vec<&str> = raw.split(PARAGRAPH_SEPARATOR).collect();

    // The opening paragraph is always the answer, even if it happens to
    // mention the marker word.
    let marker = paragraphs
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, paragraph)| paragraph.contains(FOLLOW_UP_MARKER))
        .map(|(index, _)| index);

    let Some(marker) = marker else {
        return ParsedResponse::LegacyGeneral {
            message: strip_message_prefix(raw).to_string(),
            disclaimer: String::new(),
            suggested_follow_ups: Vec::new(),
        };
    };

    let mut suggested_follow_ups = follow_up_lines(paragraphs[marker]);
    if suggested_follow_ups.is_empty() {
        // "Suggested follow-up questions:" followed by a blank line and the list.
        if let Some(next) = paragraphs.get(marker + 1) {
            suggested_follow_ups = follow_up_lines(next);
        }
    }

    let disclaimer = if marker > 1 { paragraphs[1].trim().to_string() } else { String::new() };

    ParsedResponse::LegacyGeneral {
        message: strip_message_prefix(paragraphs[0]).to_string(),
        disclaimer,
        suggested_follow_ups,
    }
}

fn strip_message_prefix(text: &str) -> &str {
    let trimmed = text.trim();
    let unbolded = trimmed
        .strip_prefix("**")
        .and_then(|rest| rest.strip_prefix(LEGACY_MESSAGE_PREFIX))
        .and_then(|rest| rest.strip_prefix("**"));
    match unbolded.or_else(|| trimmed.strip_prefix(LEGACY_MESSAGE_PREFIX)) {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    }
}

fn follow_up_lines(paragraph: &str) -> Vec<String> {
    paragraph
        .lines()
        .filter(|line| !line.contains(FOLLOW_UP_MARKER))
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim();
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_fields(parsed: ParsedResponse) -> (String, String, Vec<String>) {
        match parsed {
            ParsedResponse::LegacyGeneral { message, disclaimer, suggested_follow_ups } =>
                (message, disclaimer, suggested_follow_ups),
            other => panic!("expected LegacyGeneral, got {:?}", other),
        }
    }

    #[test]
    fn scope_refusal_needs_all_three_phrases() {
        assert!(is_scope_refusal("I'm sorry, I can only help with healthcare-related questions."));
        assert!(!is_scope_refusal("I'm sorry, I can only help with cooking questions."));
        assert!(!is_scope_refusal("Sorry, I can only help with healthcare-related questions."));
    }

    #[test]
    fn missing_marker_keeps_whole_text_as_message() {
        let raw = "CareBridge AI: Hello! I can answer health questions.\n\n*Not medical advice.*";
        let (message, disclaimer, follow_ups) = legacy_fields(parse_legacy(raw));
        assert_eq!(message, "Hello! I can answer health questions.\n\n*Not medical advice.*");
        assert!(disclaimer.is_empty());
        assert!(follow_ups.is_empty());
    }

    #[test]
    fn text_without_prefix_is_kept_whole() {
        let (message, _, _) = legacy_fields(parse_legacy("Just some text"));
        assert_eq!(message, "Just some text");
    }

    #[test]
    fn bold_prefix_is_stripped() {
        let (message, _, _) = legacy_fields(parse_legacy("**CareBridge AI:** Stay hydrated."));
        assert_eq!(message, "Stay hydrated.");
    }

    #[test]
    fn follow_ups_accept_various_bullets() {
        let raw = "CareBridge AI: Answer\n\nDisclaimer\n\n**Suggested follow-up questions:**\n* One?\n• Two?\n3. Three?";
        let (_, _, follow_ups) = legacy_fields(parse_legacy(raw));
        assert_eq!(follow_ups, vec!["One?", "Two?", "Three?"]);
    }

    #[test]
    fn list_after_blank_line_following_marker() {
        let raw = "CareBridge AI: Answer\n\nDisclaimer\n\nSuggested follow-up questions:\n\n- One?\n- Two?";
        let (message, disclaimer, follow_ups) = legacy_fields(parse_legacy(raw));
        assert_eq!(message, "Answer");
        assert_eq!(disclaimer, "Disclaimer");
        assert_eq!(follow_ups, vec!["One?", "Two?"]);
    }

    #[test]
    fn marker_directly_after_message_leaves_disclaimer_empty() {
        let raw = "CareBridge AI: Answer\n\nSuggested follow-up questions:\n- One?";
        let (message, disclaimer, follow_ups) = legacy_fields(parse_legacy(raw));
        assert_eq!(message, "Answer");
        assert!(disclaimer.is_empty());
        assert_eq!(follow_ups, vec!["One?"]);
    }

    #[test]
    fn first_marker_paragraph_wins_over_trailing_mentions() {
        let raw = "CareBridge AI: Drink water.\n\n*Not medical advice.*\n\nSuggested follow-up questions:\n- How much water?\n- When?\n\nSuggested reading: your GP leaflet.";
        let (message, disclaimer, follow_ups) = legacy_fields(parse_legacy(raw));
        assert_eq!(message, "Drink water.");
        assert_eq!(disclaimer, "*Not medical advice.*");
        assert_eq!(follow_ups, vec!["How much water?", "When?"]);
    }

    #[test]
    fn marker_word_in_answer_is_not_the_follow_up_block() {
        let raw = "CareBridge AI: Suggested daily intake is 2 litres.\n\n*Not medical advice.*";
        let (message, _, follow_ups) = legacy_fields(parse_legacy(raw));
        assert!(message.starts_with("Suggested daily intake"));
        assert!(follow_ups.is_empty());
    }
}

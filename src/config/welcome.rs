use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mood {
    pub text: &'static str,
    pub emoji: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeContent {
    pub title: &'static str,
    pub moods: &'static [Mood],
    pub common_questions: &'static [&'static str],
}

pub const MOODS: [Mood; 5] = [
    Mood { text: "Good", emoji: "😊" },
    Mood { text: "Energetic", emoji: "⚡" },
    Mood { text: "Tired", emoji: "😴" },
    Mood { text: "Stressed", emoji: "😰" },
    Mood { text: "Sick", emoji: "🤒" },
];

pub const COMMON_QUESTIONS: [&str; 5] = [
    "What are common cold remedies?",
    "How to relieve a headache naturally?",
    "What causes seasonal allergies?",
    "Tips for better sleep",
    "How to boost immunity?",
];

pub fn welcome_content() -> WelcomeContent {
    WelcomeContent {
        title: "How are you feeling today?",
        moods: &MOODS,
        common_questions: &COMMON_QUESTIONS,
    }
}

/// The user message sent when a mood is picked on the welcome card.
pub fn mood_message(mood: &str) -> String {
    format!("I'm feeling {} today", mood)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_message_wording() {
        assert_eq!(mood_message("Tired"), "I'm feeling Tired today");
    }

    #[test]
    fn welcome_content_serializes_camel_case() {
        let json = serde_json::to_value(welcome_content()).unwrap();
        assert_eq!(json["moods"].as_array().map(Vec::len), Some(5));
        assert_eq!(json["commonQuestions"][3], "Tips for better sleep");
    }
}

use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use std::fmt;

/// Fixed text the backend (or the controller, on transport failure) uses to
/// signal that no usable answer could be produced.
pub const REFUSAL_SENTINEL: &str =
    "Sorry, I couldn't process your request at the moment. Please try again later.";

/// Canonical section labels of a structured diagnosis, in display order.
pub const DIAGNOSIS_SECTIONS: [&str; 5] = [
    "Possible Cause",
    "Likely Triggers",
    "What You Can Do Now",
    "Prevention Tips",
    "See a Doctor If",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSection {
    pub section_type: String,
    pub content: String,
}

impl ContentSection {
    pub fn new(section_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            section_type: section_type.into(),
            content: content.into(),
        }
    }
}

/// One assistant turn, decoded from a raw completion string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ParsedResponse {
    StructuredDiagnosis {
        content: Vec<ContentSection>,
        suggested_follow_ups: Vec<String>,
        disclaimer: String,
    },
    LegacyGeneral {
        message: String,
        disclaimer: String,
        suggested_follow_ups: Vec<String>,
    },
    RefusalOrError,
}

impl ParsedResponse {
    pub fn suggested_follow_ups(&self) -> &[String] {
        match self {
            ParsedResponse::StructuredDiagnosis { suggested_follow_ups, .. } => suggested_follow_ups,
            ParsedResponse::LegacyGeneral { suggested_follow_ups, .. } => suggested_follow_ups,
            ParsedResponse::RefusalOrError => &[],
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ParsedResponse::RefusalOrError)
    }

    /// Plain-text form used for the clipboard. Error turns have none.
    pub fn copy_text(&self) -> Option<String> {
        match self {
            ParsedResponse::StructuredDiagnosis { content, .. } => Some(
                content
                    .iter()
                    .map(|section| format!("{}: {}", section.section_type, section.content))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            ),
            ParsedResponse::LegacyGeneral { message, disclaimer, .. } => {
                if disclaimer.is_empty() {
                    Some(message.clone())
                } else {
                    Some(format!("{}\n\n{}", message, disclaimer))
                }
            }
            ParsedResponse::RefusalOrError => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Response(ParsedResponse),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub content: MessageContent,
}

impl ConversationMessage {
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            sender: Sender::User,
            timestamp: Utc::now(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(id: MessageId, response: ParsedResponse) -> Self {
        Self {
            id,
            sender: Sender::Assistant,
            timestamp: Utc::now(),
            content: MessageContent::Response(response),
        }
    }

    pub fn response(&self) -> Option<&ParsedResponse> {
        match &self.content {
            MessageContent::Response(response) => Some(response),
            MessageContent::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Response(_) => None,
        }
    }
}

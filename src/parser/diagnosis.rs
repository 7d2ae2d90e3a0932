use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::models::chat::{ ContentSection, ParsedResponse };

#[derive(Deserialize)]
#[serde(untagged)]
enum SectionBody {
    Text(String),
    Parts(Vec<String>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSection {
    section_type: String,
    content: SectionBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Sections(Vec<RawSection>),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompletion {
    #[serde(default)]
    query_type: Option<String>,
    content: RawContent,
    #[serde(default)]
    suggested_follow_ups: Option<Vec<String>>,
    #[serde(default)]
    disclaimer: Option<String>,
}

/// Decodes a JSON completion. Returns `None` when the text is not JSON or the
/// JSON does not have the documented shape, so the caller can try the legacy
/// formats instead.
///
/// The number and order of sections is not checked.
pub fn decode(raw: &str) -> Option<ParsedResponse> {
    let body = strip_code_fence(raw.trim());
    let value: JsonValue = serde_json::from_str(body).ok()?;
    if !value.is_object() {
        return None;
    }
    let completion: RawCompletion = serde_json::from_value(value).ok()?;
    let suggested_follow_ups = completion.suggested_follow_ups.unwrap_or_default();
    let disclaimer = completion.disclaimer.unwrap_or_default();

    match completion.content {
        RawContent::Sections(sections) => Some(ParsedResponse::StructuredDiagnosis {
            content: sections.into_iter().map(into_section).collect(),
            suggested_follow_ups,
            disclaimer,
        }),
        RawContent::Text(message) => {
            let is_diagnosis = completion.query_type
                .as_deref()
                .is_some_and(|kind| kind.eq_ignore_ascii_case("diagnosis"));
            if is_diagnosis {
                return None;
            }
            Some(ParsedResponse::LegacyGeneral {
                message,
                disclaimer,
                suggested_follow_ups,
            })
        }
    }
}

fn into_section(raw: RawSection) -> ContentSection {
    let content = match raw.content {
        SectionBody::Text(text) => text,
        // Older prompts produced one-element arrays; only the first entry is shown.
        SectionBody::Parts(parts) => parts.into_iter().next().unwrap_or_default(),
    };
    ContentSection {
        section_type: raw.section_type,
        content,
    }
}

/// Removes a surrounding ```` ``` ```` / ```` ```json ```` fence. Text without a
/// complete fence is returned unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(newline) = rest.find('\n') else {
        return text;
    };
    rest[newline + 1..]
        .trim_end()
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(text)
}

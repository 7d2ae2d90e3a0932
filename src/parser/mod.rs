//! Classification of raw completion strings into [`ParsedResponse`] values.
//!
//! The backend answers in one of three shapes: the diagnosis JSON document,
//! the older markdown block introduced by `CareBridge AI:`, or the fixed
//! refusal sentinel. Parsing never fails; anything unrecognised degrades to a
//! `LegacyGeneral` turn.

pub mod diagnosis;
pub mod legacy;

use crate::models::chat::{ ParsedResponse, REFUSAL_SENTINEL };
use log::debug;

/// Which branch of [`parse_response`] produced a result. Only used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Sentinel,
    Json,
    ScopeRefusal,
    Legacy,
}

pub fn parse_response(raw: &str) -> ParsedResponse {
    let (format, parsed) = classify(raw);
    debug!("Completion parsed as {:?} ({} bytes)", format, raw.len());
    parsed
}

pub fn classify(raw: &str) -> (ResponseFormat, ParsedResponse) {
    if raw == REFUSAL_SENTINEL {
        return (ResponseFormat::Sentinel, ParsedResponse::RefusalOrError);
    }

    if let Some(parsed) = diagnosis::decode(raw) {
        return (ResponseFormat::Json, parsed);
    }

    if legacy::is_scope_refusal(raw) {
        return (
            ResponseFormat::ScopeRefusal,
            ParsedResponse::LegacyGeneral {
                message: raw.to_string(),
                disclaimer: String::new(),
                suggested_follow_ups: Vec::new(),
            },
        );
    }

    (ResponseFormat::Legacy, legacy::parse_legacy(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ContentSection;

    const DIAGNOSIS_SCENARIO: &str = r#"{"queryType":"Diagnosis","content":[{"sectionType":"Possible Cause","content":"- **Name**- Tension headache"}],"suggestedFollowUps":["a","b","c"],"disclaimer":"d"}"#;

    #[test]
    fn sentinel_is_refusal_or_error() {
        assert_eq!(parse_response(REFUSAL_SENTINEL), ParsedResponse::RefusalOrError);
    }

    #[test]
    fn sentinel_with_extra_whitespace_is_not_the_sentinel() {
        let raw = format!("{}\n", REFUSAL_SENTINEL);
        assert_ne!(parse_response(&raw), ParsedResponse::RefusalOrError);
    }

    #[test]
    fn diagnosis_scenario_yields_one_section() {
        let parsed = parse_response(DIAGNOSIS_SCENARIO);
        assert_eq!(
            parsed,
            ParsedResponse::StructuredDiagnosis {
                content: vec![
                    ContentSection::new("Possible Cause", "- **Name**- Tension headache")
                ],
                suggested_follow_ups: vec!["a".into(), "b".into(), "c".into()],
                disclaimer: "d".into(),
            }
        );
    }

    #[test]
    fn scope_refusal_keeps_raw_text() {
        let raw = "I’m sorry, I can only help with healthcare-related questions.";
        assert_eq!(
            parse_response(raw),
            ParsedResponse::LegacyGeneral {
                message: raw.to_string(),
                disclaimer: String::new(),
                suggested_follow_ups: Vec::new(),
            }
        );
    }

    #[test]
    fn legacy_markdown_is_split_into_fields() {
        let raw = "CareBridge AI: Aim for 7-9 hours of sleep.\n\n*This is not a substitute for professional medical advice.*\n\nSuggested follow-up questions:\n- How do I fall asleep faster?\n- Is napping healthy?\n- Does caffeine affect sleep?";
        let (format, parsed) = classify(raw);
        assert_eq!(format, ResponseFormat::Legacy);
        assert_eq!(
            parsed,
            ParsedResponse::LegacyGeneral {
                message: "Aim for 7-9 hours of sleep.".into(),
                disclaimer: "*This is not a substitute for professional medical advice.*".into(),
                suggested_follow_ups: vec![
                    "How do I fall asleep faster?".into(),
                    "Is napping healthy?".into(),
                    "Does caffeine affect sleep?".into()
                ],
            }
        );
    }

    #[test]
    fn json_that_is_not_a_diagnosis_falls_through_to_legacy() {
        let (format, parsed) = classify("42");
        assert_eq!(format, ResponseFormat::Legacy);
        assert_eq!(
            parsed,
            ParsedResponse::LegacyGeneral {
                message: "42".into(),
                disclaimer: String::new(),
                suggested_follow_ups: Vec::new(),
            }
        );
    }

    #[test]
    fn empty_input_degrades_to_empty_legacy_turn() {
        assert_eq!(
            parse_response(""),
            ParsedResponse::LegacyGeneral {
                message: String::new(),
                disclaimer: String::new(),
                suggested_follow_ups: Vec::new(),
            }
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let inputs = [
            DIAGNOSIS_SCENARIO,
            REFUSAL_SENTINEL,
            "CareBridge AI: Hi there!\n\nSuggested follow-up questions:\n- a",
            "no structure at all",
        ];
        for raw in inputs {
            assert_eq!(parse_response(raw), parse_response(raw), "input: {}", raw);
        }
    }
}

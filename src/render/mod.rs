//! Projects conversation messages into display-ready blocks.

use chrono::{ DateTime, Utc };
use pulldown_cmark::{ html, CowStr, Event, Options, Parser, Tag };
use serde::Serialize;
use std::collections::HashMap;

use crate::models::chat::{
    ConversationMessage,
    MessageId,
    ParsedResponse,
    Sender,
    DIAGNOSIS_SECTIONS,
    REFUSAL_SENTINEL,
};

pub const DEFAULT_STYLE_KEY: &str = "others";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Blue,
    Yellow,
    Green,
    Fuchsia,
    Red,
}

/// Section label to presentation tone. Labels without an entry use the
/// `others` tone.
#[derive(Clone, Debug)]
pub struct SectionColorPolicy {
    tones: HashMap<String, Tone>,
    fallback: Tone,
}

impl Default for SectionColorPolicy {
    fn default() -> Self {
        let tones = [Tone::Blue, Tone::Yellow, Tone::Green, Tone::Fuchsia, Tone::Red];
        Self {
            tones: DIAGNOSIS_SECTIONS.iter()
                .zip(tones)
                .map(|(label, tone)| (label.to_string(), tone))
                .collect(),
            fallback: Tone::Blue,
        }
    }
}

impl SectionColorPolicy {
    pub fn with_tone(mut self, label: impl Into<String>, tone: Tone) -> Self {
        let label = label.into();
        if label == DEFAULT_STYLE_KEY {
            self.fallback = tone;
        } else {
            self.tones.insert(label, tone);
        }
        self
    }

    pub fn style_for(&self, label: &str) -> Tone {
        self.tones.get(label).copied().unwrap_or(self.fallback)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tone: Tone,
    pub html: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub blocks: Vec<RenderedBlock>,
    /// Rendered HTML, absent when the response carries no disclaimer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    pub suggested_follow_ups: Vec<String>,
    pub copyable: bool,
    pub is_error: bool,
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    // Raw HTML from the model or the user is shown as text, never injected.
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) =>
            Event::Start(Tag::Link { link_type, dest_url: safe_destination(dest_url), title, id }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) =>
            Event::Start(Tag::Image { link_type, dest_url: safe_destination(dest_url), title, id }),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn render_message(message: &ConversationMessage, policy: &SectionColorPolicy) -> RenderedMessage {
    let mut rendered = RenderedMessage {
        id: message.id,
        sender: message.sender,
        timestamp: message.timestamp,
        blocks: Vec::new(),
        disclaimer: None,
        suggested_follow_ups: Vec::new(),
        copyable: false,
        is_error: false,
    };

    if let Some(text) = message.text() {
        rendered.blocks.push(RenderedBlock {
            title: None,
            tone: policy.style_for(DEFAULT_STYLE_KEY),
            html: markdown_to_html(text),
        });
        return rendered;
    }

    let Some(response) = message.response() else {
        return rendered;
    };
    rendered.suggested_follow_ups = response.suggested_follow_ups().to_vec();
    rendered.copyable = response.copy_text().is_some();

    match response {
        ParsedResponse::StructuredDiagnosis { content, disclaimer, .. } => {
            rendered.blocks = content
                .iter()
                .map(|section| RenderedBlock {
                    title: Some(section.section_type.clone()),
                    tone: policy.style_for(&section.section_type),
                    html: markdown_to_html(&section.content),
                })
                .collect();
            rendered.disclaimer = non_empty_html(disclaimer);
        }
        ParsedResponse::LegacyGeneral { message: text, disclaimer, .. } => {
            rendered.blocks.push(RenderedBlock {
                title: None,
                tone: policy.style_for(DEFAULT_STYLE_KEY),
                html: markdown_to_html(text),
            });
            rendered.disclaimer = non_empty_html(disclaimer);
        }
        ParsedResponse::RefusalOrError => {
            rendered.is_error = true;
            rendered.blocks.push(RenderedBlock {
                title: None,
                tone: Tone::Red,
                html: markdown_to_html(REFUSAL_SENTINEL),
            });
        }
    }

    rendered
}

pub fn render_all(messages: &[ConversationMessage], policy: &SectionColorPolicy) -> Vec<RenderedMessage> {
    messages
        .iter()
        .map(|m| render_message(m, policy))
        .collect()
}

fn non_empty_html(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| markdown_to_html(text))
}

fn safe_destination(url: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&url) { url } else { CowStr::Borrowed("#") }
}

/// Allows http, https and mailto links plus relative references. Browsers
/// ignore embedded whitespace and control characters in the scheme, so those
/// are dropped before it is compared.
fn is_safe_url(url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.find([':', '/', '?', '#']) {
        Some(at) if normalized[at..].starts_with(':') => {
            matches!(&normalized[..at], "http" | "https" | "mailto")
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ContentSection;

    #[test]
    fn every_canonical_label_has_its_own_tone() {
        let policy = SectionColorPolicy::default();
        assert_eq!(policy.style_for("Possible Cause"), Tone::Blue);
        assert_eq!(policy.style_for("Likely Triggers"), Tone::Yellow);
        assert_eq!(policy.style_for("What You Can Do Now"), Tone::Green);
        assert_eq!(policy.style_for("Prevention Tips"), Tone::Fuchsia);
        assert_eq!(policy.style_for("See a Doctor If"), Tone::Red);
    }

    #[test]
    fn unknown_label_falls_back_to_others() {
        let policy = SectionColorPolicy::default().with_tone(DEFAULT_STYLE_KEY, Tone::Green);
        assert_eq!(policy.style_for("Something New"), Tone::Green);
    }

    #[test]
    fn diagnosis_renders_every_present_section() {
        let message = ConversationMessage::assistant(MessageId(2), ParsedResponse::StructuredDiagnosis {
            content: vec![
                ContentSection::new("Likely Triggers", "- stress\n- dehydration"),
                ContentSection::new("Extra", "**bold**")
            ],
            suggested_follow_ups: vec!["a".into()],
            disclaimer: "d".into(),
        });
        let rendered = render_message(&message, &SectionColorPolicy::default());

        assert_eq!(rendered.blocks.len(), 2);
        assert_eq!(rendered.blocks[0].title.as_deref(), Some("Likely Triggers"));
        assert_eq!(rendered.blocks[0].tone, Tone::Yellow);
        assert!(rendered.blocks[0].html.contains("<li>stress</li>"));
        assert_eq!(rendered.blocks[1].tone, Tone::Blue);
        assert!(rendered.blocks[1].html.contains("<strong>bold</strong>"));
        assert_eq!(rendered.disclaimer.as_deref(), Some("<p>d</p>\n"));
        assert_eq!(rendered.suggested_follow_ups, vec!["a".to_string()]);
        assert!(rendered.copyable);
        assert!(!rendered.is_error);
    }

    #[test]
    fn refusal_renders_as_error_without_copy() {
        let message = ConversationMessage::assistant(MessageId(4), ParsedResponse::RefusalOrError);
        let rendered = render_message(&message, &SectionColorPolicy::default());
        assert!(rendered.is_error);
        assert!(!rendered.copyable);
        assert_eq!(rendered.blocks.len(), 1);
        assert!(rendered.suggested_follow_ups.is_empty());
    }

    #[test]
    fn legacy_with_empty_disclaimer_has_none() {
        let message = ConversationMessage::assistant(MessageId(6), ParsedResponse::LegacyGeneral {
            message: "Hello".into(),
            disclaimer: String::new(),
            suggested_follow_ups: vec![],
        });
        let rendered = render_message(&message, &SectionColorPolicy::default());
        assert_eq!(rendered.disclaimer, None);
        assert_eq!(rendered.blocks[0].html, "<p>Hello</p>\n");
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = markdown_to_html("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn script_links_are_neutralized() {
        for source in [
            "[click](javascript:alert(1))",
            "[click](JavaScript:alert(1))",
            "[click](<java script:alert(1)>)",
            "![img](data:text/html;base64,PHNjcmlwdD4=)",
            "[click](vbscript:msgbox)",
        ] {
            let html = markdown_to_html(source);
            assert!(!html.to_ascii_lowercase().contains("script:"), "{source} -> {html}");
            assert!(!html.contains("data:"), "{source} -> {html}");
            assert!(html.contains("\"#\""), "{source} -> {html}");
        }
    }

    #[test]
    fn web_and_relative_links_are_kept() {
        assert!(markdown_to_html("[nhs](https://www.nhs.uk/)").contains("href=\"https://www.nhs.uk/\""));
        assert!(markdown_to_html("[mail](mailto:care@example.org)").contains("href=\"mailto:care@example.org\""));
        assert!(markdown_to_html("[faq](/help/faq?q=a:b)").contains("href=\"/help/faq?q=a:b\""));
        assert!(markdown_to_html("[top](#section)").contains("href=\"#section\""));
    }

    #[test]
    fn legacy_disclaimer_is_rendered_as_html() {
        let message = ConversationMessage::assistant(MessageId(8), ParsedResponse::LegacyGeneral {
            message: "Rest.".into(),
            disclaimer: "*Not medical advice.*".into(),
            suggested_follow_ups: vec![],
        });
        let rendered = render_message(&message, &SectionColorPolicy::default());
        assert_eq!(rendered.disclaimer.as_deref(), Some("<p><em>Not medical advice.</em></p>\n"));
    }

    #[test]
    fn rendered_message_serializes_camel_case() {
        let message = ConversationMessage::user(MessageId(1), "hi");
        let json = serde_json::to_value(render_message(&message, &SectionColorPolicy::default())).unwrap();
        assert_eq!(json["sender"], "user");
        assert_eq!(json["id"], 1);
        assert_eq!(json["isError"], false);
        assert!(json["suggestedFollowUps"].as_array().unwrap().is_empty());
        assert_eq!(json["blocks"][0]["tone"], "blue");
    }
}

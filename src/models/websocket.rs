use serde::{ Serialize, Deserialize };

use crate::render::RenderedMessage;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    /// A mood picked on the welcome card.
    #[serde(rename = "mood")] Mood {
        mood: String,
    },
    #[serde(rename = "copy")] Copy {
        #[serde(rename = "messageId")]
        message_id: u64,
    },
}

#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "message")] Message {
        message: RenderedMessage,
    },
    #[serde(rename = "copied")] Copied {
        #[serde(rename = "messageId")]
        message_id: u64,
        text: String,
    },
    #[serde(rename = "notification")] Notification {
        message: String,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "idle")]
    Idle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_type_tag() {
        let chat: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"hi"}"#).unwrap();
        assert!(matches!(chat, ClientMessage::Chat { content } if content == "hi"));

        let copy: ClientMessage = serde_json::from_str(r#"{"type":"copy","messageId":3}"#).unwrap();
        assert!(matches!(copy, ClientMessage::Copy { message_id: 3 }));
    }

    #[test]
    fn processing_serializes_as_bare_tag() {
        let json = serde_json::to_string(&ServerMessage::Processing).unwrap();
        assert_eq!(json, r#"{"type":"processing"}"#);
    }
}

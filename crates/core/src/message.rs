//! Message domain types.
//!
//! Conversation messages arrive from the chat collaborator either as plain
//! text or as a list of typed segments (text, images, ...). Both shapes are
//! modelled as one tagged union with an explicit text extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
}

/// One typed segment of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSegment {
    Text {
        text: String,
    },
    Image {
        #[serde(default, alias = "image_url")]
        url: String,
    },
    /// Any segment kind we do not interpret (audio, tool output, ...).
    #[serde(other)]
    Other,
}

/// Message content: either a plain string or an ordered segment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Segments(Vec<ContentSegment>),
}

impl MessageContent {
    /// Extract the textual part of the content.
    ///
    /// Segment lists contribute only their text segments, in order,
    /// separated by newlines.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Segments(segments) => segments
                .iter()
                .filter_map(|segment| match segment {
                    ContentSegment::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Segments(segments) => segments.is_empty(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<Vec<ContentSegment>> for MessageContent {
    fn from(segments: Vec<ContentSegment>) -> Self {
        MessageContent::Segments(segments)
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// Text or segment content
    pub content: MessageContent,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create a new system message.
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Plain text of this message.
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// The most recent user message in an ordered history.
pub fn last_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::User)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, assistant!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello, assistant!");
    }

    #[test]
    fn segments_keep_only_text_in_order() {
        let msg = Message::user(vec![
            ContentSegment::Text { text: "add a".into() },
            ContentSegment::Image { url: "data:image/png;base64,AAAA".into() },
            ContentSegment::Text { text: "login form".into() },
        ]);
        assert_eq!(msg.text(), "add a\nlogin form");
    }

    #[test]
    fn content_deserializes_from_string_or_segments() {
        let text: MessageContent = serde_json::from_str(r#""center the button""#).unwrap();
        assert_eq!(text, MessageContent::Text("center the button".into()));

        let segments: MessageContent = serde_json::from_str(
            r#"[{"type":"text","text":"hi"},{"type":"image","image_url":"x"},{"type":"audio"}]"#,
        )
        .unwrap();
        match segments {
            MessageContent::Segments(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[2], ContentSegment::Other);
            }
            other => panic!("expected segments, got {other:?}"),
        }
    }

    #[test]
    fn last_user_message_skips_assistant_turns() {
        let history = vec![
            Message::user("first"),
            Message::assistant("ok"),
            Message::user("second"),
            Message::assistant("done"),
        ];
        assert_eq!(last_user_message(&history).unwrap().text(), "second");
        assert!(last_user_message(&[Message::assistant("hi")]).is_none());
    }
}

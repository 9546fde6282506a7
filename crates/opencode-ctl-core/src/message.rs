//! Message types exchanged with a session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One part of a message. Only `text` parts are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Part type, e.g. `text`, `tool`, `file`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Payload of text parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Fields not interpreted by the client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Part {
    /// Part type carrying human-readable text.
    pub const TEXT: &'static str = "text";

    /// Whether this is a text part.
    pub fn is_text(&self) -> bool {
        self.kind == Self::TEXT
    }
}

/// Message metadata envelope used by the server's message listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Message identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Owning session
    #[serde(rename = "sessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Fields not interpreted by the client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message in a session.
///
/// The role may be reported at the top level or inside `info`; [`Message::role`]
/// checks both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role when reported at the top level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Metadata envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MessageInfo>,
    /// Ordered message parts
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Fields not interpreted by the client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Role of the user who sent a prompt.
    pub const USER: &'static str = "user";
    /// Role of model responses.
    pub const ASSISTANT: &'static str = "assistant";

    /// Author role, from the top level or the `info` envelope.
    pub fn role(&self) -> Option<&str> {
        self.role
            .as_deref()
            .or_else(|| self.info.as_ref().and_then(|info| info.role.as_deref()))
    }

    /// Message identifier, if the server sent one.
    pub fn id(&self) -> Option<&str> {
        self.info.as_ref().and_then(|info| info.id.as_deref())
    }

    /// Whether the message was written by the assistant.
    pub fn is_assistant(&self) -> bool {
        self.role() == Some(Self::ASSISTANT)
    }

    /// Payloads of the text parts in order; a text part without payload
    /// yields an empty string.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter(|part| part.is_text())
            .map(|part| part.text.as_deref().unwrap_or(""))
    }

    /// Text parts joined by newlines.
    pub fn text(&self) -> String {
        self.text_parts().collect::<Vec<_>>().join("\n")
    }
}

/// Text of the newest assistant message in `messages` (ordered oldest first).
///
/// Returns `None` when no assistant message is present.
pub fn last_assistant_text(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|message| message.is_assistant())
        .map(Message::text)
}

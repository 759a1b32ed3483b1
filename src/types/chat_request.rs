use serde::{Deserialize, Serialize};

/// Session identifier sent with every request unless the configuration overrides it.
pub const DEFAULT_SESSION_ID: &str = "example-session-id";

/// The conversation mode requested from the workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Free-form chat.
    #[default]
    Chat,
}

/// The body of one stream-chat request.
///
/// A request is built fresh for every user turn and never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message, verbatim.
    pub message: String,

    /// The conversation mode.
    pub mode: ChatMode,

    /// The session identifier.
    pub session_id: String,

    /// Attachments; always empty.
    pub attachments: Vec<serde_json::Value>,
}

impl ChatRequest {
    /// Create a new chat-mode request for `message` under `session_id`.
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: ChatMode::Chat,
            session_id: session_id.into(),
            attachments: Vec::new(),
        }
    }
}

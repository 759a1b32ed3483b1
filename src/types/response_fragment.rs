use serde::{Deserialize, Serialize};

/// One decoded line of a stream-chat response.
///
/// Missing or `null` fields take their defaults; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFragment {
    /// Text to print, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,

    /// Whether this is the final fragment of the exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<bool>,
}

impl ResponseFragment {
    /// Create a fragment carrying `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text_response: Some(text.into()),
            close: None,
        }
    }

    /// Mark this fragment as the closing one.
    pub fn closing(mut self) -> Self {
        self.close = Some(true);
        self
    }

    /// The text to print; empty when absent.
    pub fn text_response(&self) -> &str {
        self.text_response.as_deref().unwrap_or("")
    }

    /// Whether the exchange ends with this fragment.
    pub fn is_close(&self) -> bool {
        self.close.unwrap_or(false)
    }
}

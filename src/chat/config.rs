//! Configuration types for the chat application.
//!
//! Connection settings come from a YAML file; the command line only says where that
//! file is and how to render.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stream::DEFAULT_MAX_LINE_BYTES;
use crate::types::DEFAULT_SESSION_ID;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Keys that must be present in the configuration file.
const REQUIRED_KEYS: [&str; 4] = [
    "api_key",
    "model_server_base_url",
    "stream_timeout",
    "workspace_slug",
];

/// Command-line arguments for the workspace-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path to the YAML configuration file.
    #[arrrg(optional, "Configuration file (default: config.yaml)", "PATH")]
    pub config: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

impl ChatArgs {
    /// The configuration file to load.
    pub fn config_path(&self) -> PathBuf {
        PathBuf::from(self.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH))
    }
}

/// Connection settings for a chat session.
///
/// Loaded once at startup and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Bearer token sent in the `Authorization` header.
    pub api_key: String,

    /// Base URL of the chat server, e.g. `http://localhost:3001/api/v1`.
    #[serde(rename = "model_server_base_url")]
    pub base_url: String,

    /// Connect and per-read timeout, in seconds.
    pub stream_timeout: f64,

    /// Path segment naming the target workspace.
    pub workspace_slug: String,

    /// Session identifier sent with every request.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Longest partial line the stream buffer will hold.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// When set, every exchange is appended to this file as JSON lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

impl ChatConfig {
    /// Load and validate the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not YAML, lacks a required key,
    /// or holds an invalid value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::io(
                format!("could not read configuration {}: {e}", path.display()),
                e,
            )
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on malformed YAML, a missing required key, or an
    /// invalid value.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        let Some(mapping) = value.as_mapping() else {
            return Err(Error::config("expected a mapping of keys to values", None));
        };
        for key in REQUIRED_KEYS {
            if !mapping.contains_key(key) {
                return Err(Error::config(
                    format!("missing required key `{key}`"),
                    Some(key.to_string()),
                ));
            }
        }
        let config: Self = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            Error::config(
                format!("invalid base URL {:?}: {e}", self.base_url),
                Some("model_server_base_url".to_string()),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                format!("unsupported URL scheme {:?}", url.scheme()),
                Some("model_server_base_url".to_string()),
            ));
        }
        if !self.stream_timeout.is_finite() || self.stream_timeout <= 0.0 {
            return Err(Error::config(
                format!("must be a positive number of seconds, got {}", self.stream_timeout),
                Some("stream_timeout".to_string()),
            ));
        }
        Duration::try_from_secs_f64(self.stream_timeout).map_err(|e| {
            Error::config(
                format!("{} seconds is out of range: {e}", self.stream_timeout),
                Some("stream_timeout".to_string()),
            )
        })?;
        if self.workspace_slug.is_empty() || self.workspace_slug.contains('/') {
            return Err(Error::config(
                format!("invalid workspace slug {:?}", self.workspace_slug),
                Some("workspace_slug".to_string()),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(Error::config(
                "must be greater than zero",
                Some("max_line_bytes".to_string()),
            ));
        }
        Ok(())
    }

    /// The stream-chat endpoint for the configured workspace.
    pub fn chat_url(&self) -> String {
        format!(
            "{}/workspace/{}/stream-chat",
            self.base_url.trim_end_matches('/'),
            self.workspace_slug
        )
    }

    /// The configured timeout as a [`Duration`].
    ///
    /// Values that do not fit a [`Duration`] saturate to [`Duration::MAX`].
    pub fn stream_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.stream_timeout).unwrap_or(Duration::MAX)
    }

    /// Sets the session identifier.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Sets the partial line limit.
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Sets the exchange log file.
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }
}

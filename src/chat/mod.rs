//! Chat application module for interactive conversations with a workspace.
//!
//! This module provides the read-send-stream loop behind the `workspace-chat`
//! binary:
//!
//! - [`config`]: CLI arguments and the YAML connection settings
//! - [`commands`]: exit words and line input
//! - [`session`]: the interactive loop and one streaming exchange per message

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{
    ChatCommand, EXIT_WORDS, EditorReader, GOODBYE, LineReader, USER_PROMPT, is_exit_command,
    parse_command,
};
pub use config::{ChatArgs, ChatConfig, DEFAULT_CONFIG_PATH};
pub use session::{ChatSession, ExchangeOutcome};

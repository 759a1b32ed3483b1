//! Interactive terminal client for a workspace stream-chat endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Read connection settings from ./config.yaml
//! workspace-chat
//!
//! # Use another configuration file
//! workspace-chat --config ~/.config/workspace-chat.yaml
//!
//! # Disable colors (useful for piping output)
//! workspace-chat --no-color
//! ```
//!
//! The configuration file is YAML:
//!
//! ```yaml
//! api_key: "XXXXXXX-XXXXXXX-XXXXXXX-XXXXXXX"
//! model_server_base_url: "http://localhost:3001/api/v1"
//! stream_timeout: 60
//! workspace_slug: "my-workspace"
//! ```
//!
//! Type `exit`, `quit`, `q`, `stop`, or `bye` to leave.

use std::process::ExitCode;
use std::sync::Arc;

use arrrg::CommandLine;

use workspace_chat::chat::{ChatArgs, ChatConfig, ChatSession, EditorReader, PlainTextRenderer};
use workspace_chat::{JsonLinesLogger, Result};

/// Main entry point for the workspace-chat application.
#[tokio::main]
async fn main() -> ExitCode {
    let (args, _) = ChatArgs::from_command_line_relaxed("workspace-chat [OPTIONS]");
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error details: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: ChatArgs) -> Result<()> {
    let config = ChatConfig::from_file(args.config_path())?;
    let mut session = ChatSession::new(&config)?;
    if let Some(path) = &config.log_file {
        session = session.with_logger(Arc::new(JsonLinesLogger::open(path)?));
    }
    let mut renderer = PlainTextRenderer::with_color(!args.no_color);
    let mut input = EditorReader::new()?;
    session.run(&mut input, &mut renderer).await
}

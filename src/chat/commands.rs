//! Input handling for the chat application.
//!
//! A line of input either ends the session or is sent verbatim as a message.  Lines
//! come from a [`LineReader`]; [`EditorReader`] reads them from the terminal.

use std::io;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::error::{Error, Result};

/// Prompt shown before each line of input.
pub const USER_PROMPT: &str = "You: ";

/// Printed when the user leaves the chat.
pub const GOODBYE: &str = "Exiting chat. Goodbye!";

/// Inputs that end the session, compared case-insensitively.
pub const EXIT_WORDS: [&str; 5] = ["exit", "quit", "q", "stop", "bye"];

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Leave the chat.
    Exit,

    /// Send this message, which may be empty.
    Send(String),
}

/// Returns true if `input` is one of the exit words, ignoring case.
///
/// Surrounding whitespace is significant: `"q "` is a message.
pub fn is_exit_command(input: &str) -> bool {
    let lowered = input.to_lowercase();
    EXIT_WORDS.contains(&lowered.as_str())
}

/// Parse a line of user input.
pub fn parse_command(input: &str) -> ChatCommand {
    if is_exit_command(input) {
        ChatCommand::Exit
    } else {
        ChatCommand::Send(input.to_string())
    }
}

/// A source of user input lines.
pub trait LineReader {
    /// Show `prompt` and read one line, without its line terminator.
    ///
    /// Returns `Ok(None)` when the user ends input (end of file or interrupt).
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Reads lines from the terminal with history and line editing.
pub struct EditorReader {
    editor: DefaultEditor,
}

impl EditorReader {
    /// Open the terminal for reading.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the terminal cannot be initialized.
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(readline_error)?;
        Ok(Self { editor })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
            Err(err) => Err(readline_error(err)),
        }
    }
}

fn readline_error(err: ReadlineError) -> Error {
    match err {
        ReadlineError::Io(err) => Error::io(format!("Input error: {err}"), err),
        err => Error::io(
            format!("Input error: {err}"),
            io::Error::other(err.to_string()),
        ),
    }
}

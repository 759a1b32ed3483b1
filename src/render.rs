//! Output rendering for the chat application.
//!
//! Response text is written unstyled and flushed as it arrives.  Error lines may be
//! colored with ANSI escape codes.

use std::io::{self, Stdout, Write};

/// ANSI escape code for red text (used for error lines).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Prefix printed once at the start of every response.
pub const AGENT_PREFIX: &str = "Agent: ";

/// Trait for rendering chat output.
///
/// Every method flushes, so that output is visible before more data arrives.  Write
/// failures are returned; the terminal going away is not something a chat survives.
pub trait Renderer: Send {
    /// Print the `Agent: ` prefix that opens a response.
    fn start_response(&mut self) -> io::Result<()>;

    /// Print a chunk of response text.
    fn print_text(&mut self, text: &str) -> io::Result<()>;

    /// End a response that the server explicitly closed.
    fn finish_response(&mut self) -> io::Result<()>;

    /// Report a failed request.
    fn print_request_error(&mut self, error: &str) -> io::Result<()>;

    /// Report a fragment that could not be interpreted.
    fn print_chunk_error(&mut self, error: &str) -> io::Result<()>;

    /// Print an informational line.
    fn print_info(&mut self, info: &str) -> io::Result<()>;
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// The underlying writer.
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Consumes the renderer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_error_line(&mut self, label: &str, error: &str) -> io::Result<()> {
        if self.use_color {
            writeln!(self.out, "{ANSI_RED}{label}: {error}{ANSI_RESET}")?;
        } else {
            writeln!(self.out, "{label}: {error}")?;
        }
        self.out.flush()
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn start_response(&mut self) -> io::Result<()> {
        write!(self.out, "{AGENT_PREFIX}")?;
        self.out.flush()
    }

    fn print_text(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "{text}")?;
        self.out.flush()
    }

    fn finish_response(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    fn print_request_error(&mut self, error: &str) -> io::Result<()> {
        self.print_error_line("Request error", error)
    }

    fn print_chunk_error(&mut self, error: &str) -> io::Result<()> {
        self.print_error_line("Error processing chunk", error)
    }

    fn print_info(&mut self, info: &str) -> io::Result<()> {
        writeln!(self.out, "{info}")?;
        self.out.flush()
    }
}

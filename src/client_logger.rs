//! Logging hooks for chat exchanges.
//!
//! This module provides the [`ExchangeLogger`] trait that allows callers to capture
//! every request and fragment passing through a [`ChatSession`](crate::chat::ChatSession),
//! and [`JsonLinesLogger`], which appends them to a file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use serde_json::json;

use crate::chat::ExchangeOutcome;
use crate::error::Result;
use crate::types::{ChatRequest, ResponseFragment};

/// A trait for logging chat exchanges.
///
/// Implementations must not fail the exchange; errors are theirs to swallow.
///
/// # Example
///
/// ```rust,ignore
/// use workspace_chat::{ExchangeLogger, ChatRequest, ResponseFragment, ExchangeOutcome};
///
/// struct StderrLogger;
///
/// impl ExchangeLogger for StderrLogger {
///     fn log_request(&self, request: &ChatRequest) {
///         eprintln!("-> {}", request.message);
///     }
///
///     fn log_fragment(&self, fragment: &ResponseFragment) {
///         eprintln!("<- {:?}", fragment);
///     }
///
///     fn log_outcome(&self, outcome: &ExchangeOutcome) {
///         eprintln!("== {}", outcome);
///     }
/// }
/// ```
pub trait ExchangeLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log a fragment as it is decoded.
    fn log_fragment(&self, fragment: &ResponseFragment);

    /// Log how an exchange ended.
    fn log_outcome(&self, outcome: &ExchangeOutcome);
}

/// Appends one JSON object per event to a file.
pub struct JsonLinesLogger {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesLogger {
    /// Open `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_event(&self, event: serde_json::Value) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let _ = serde_json::to_writer(&mut *writer, &event);
        let _ = writeln!(writer);
        let _ = writer.flush();
    }
}

impl ExchangeLogger for JsonLinesLogger {
    fn log_request(&self, request: &ChatRequest) {
        self.write_event(json!({"event": "request", "request": request}));
    }

    fn log_fragment(&self, fragment: &ResponseFragment) {
        self.write_event(json!({"event": "fragment", "fragment": fragment}));
    }

    fn log_outcome(&self, outcome: &ExchangeOutcome) {
        self.write_event(json!({"event": "outcome", "outcome": outcome.to_string()}));
    }
}

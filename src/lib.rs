// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod render;
pub mod stream;
pub mod types;

// Re-exports
pub use chat::{ChatArgs, ChatConfig, ChatSession, ExchangeOutcome};
pub use client::{ByteStream, ChatClient, ChatTransport};
pub use client_logger::{ExchangeLogger, JsonLinesLogger};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use types::*;

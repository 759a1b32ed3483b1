// Public modules
pub mod chat_request;
pub mod response_fragment;

// Re-exports
pub use chat_request::{ChatMode, ChatRequest, DEFAULT_SESSION_ID};
pub use response_fragment::ResponseFragment;

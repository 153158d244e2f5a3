pub mod app;
pub mod backend;
pub mod config;
pub mod conversation;
pub mod documents;
pub mod draft;
pub mod error;
pub mod handler;
pub mod logging;
pub mod state;
pub mod tui;
pub mod ui;
pub mod voice;

// Re-export main types for convenience
pub use app::App;
pub use backend::{BackendKind, OllamaBackend, ReplyBackend, SimulatedBackend};
pub use config::Config;
pub use conversation::{Conversation, ReplyOutcome};
pub use documents::{Document, DocumentLibrary};
pub use draft::Draft;
pub use error::ChatError;
pub use state::{ChatMessage, ChatRole};
pub use voice::{Dictation, DictationEvent, ListenState, VoiceInput};

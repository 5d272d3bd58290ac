// Public modules
pub mod auth;
pub mod chat;
pub mod client;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod history;
pub mod message_log;
pub mod observability;
pub mod render;
pub mod session;
pub mod sse;
pub mod stream;
pub mod upload;

// Re-exports
pub use auth::{AuthKind, AuthOutcome, Credentials};
pub use client::{AuthResponse, ByteStream, ChatBackend, ChatClient, ChatResponse, StreamFormat};
pub use controller::UiController;
pub use error::{Error, Result};
pub use history::HistoryMessage;
pub use message_log::{ArtifactKind, Entry, EntryId, Message, MessageLog, Role, UploadArtifact};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer, View, render_log};
pub use session::{FileStorage, MemoryStorage, Session, TokenStorage};
pub use stream::{ResponseStream, StreamState};
pub use upload::{UploadFile, UploadReceipt};

//! BizAssist chat core.
//!
//! Session state, document-context lifecycle and turn orchestration for
//! the BizAssist chat client. The pieces:
//!
//! - [`session::SessionStore`] — in-process message list + document slot
//! - [`document::DocumentManager`] — upload → remote-processing → ready
//!   state machine with best-effort cleanup
//! - [`ai::LlmGateway`] — provider boundary (Gemini implementation)
//! - [`controller::ChatSession`] — one-turn-at-a-time orchestration
//! - [`user::UserContextProvider`] — identity + per-user history over the
//!   durable key-value boundary

pub mod ai;
pub mod controller;
pub mod document;
pub mod error;
pub mod export;
pub mod picker;
pub mod session;
pub mod storage;
pub mod types;
pub mod user;

pub use ai::{GeminiClient, LlmGateway};
pub use controller::{AttachOutcome, ChatSession, HISTORY_WINDOW};
pub use document::{DocumentManager, DocumentState};
pub use error::{ChatError, ChatResult};
pub use picker::DocumentPicker;
pub use session::SessionStore;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use types::{
    DocumentContext, DocumentStatus, FileState, FileStatus, Message, PickResult, RemoteFile,
    Sender, UserIdentity,
};
pub use user::UserContextProvider;

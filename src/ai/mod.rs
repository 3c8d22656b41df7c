//! LLM gateway boundary.
//!
//! Stateless request/response wrapper around the external AI provider:
//! plain-text generation, file-grounded generation, file upload, file
//! status query and file deletion. The rest of the crate only sees the
//! `LlmGateway` trait; `gemini` is the production implementation.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bizassist::ai::{GeminiClient, LlmGateway};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = GeminiClient::from_env()?;
//! let reply = gateway.generate_text("Hello!").await?;
//! # Ok(())
//! # }
//! ```

mod extract;
mod gemini;

pub use extract::extract_text;
pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::error::ChatResult;
use crate::types::{FileStatus, RemoteFile};

#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Upload file bytes to the provider's file storage.
    async fn upload(&self, bytes: &[u8], display_name: &str) -> ChatResult<RemoteFile>;

    /// Query the remote processing state of an uploaded file.
    async fn file_status(&self, handle: &str) -> ChatResult<FileStatus>;

    /// Best-effort delete of an uploaded file. Never fails the caller:
    /// provider or transport errors are logged and reported as `false`.
    async fn delete_file(&self, handle: &str) -> bool;

    /// Plain generation over a fully assembled prompt.
    async fn generate_text(&self, prompt: &str) -> ChatResult<String>;

    /// Generation grounded on an uploaded file.
    async fn generate_with_file(
        &self,
        system_prompt: &str,
        handle: &str,
        question: &str,
    ) -> ChatResult<String>;
}

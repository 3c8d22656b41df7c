//! Conversation controller.
//!
//! `ChatSession` is the explicit session object: it owns the session
//! store, the document manager and the pending-operation flag, and
//! orchestrates one turn at a time against the gateway. Its lifecycle is
//! the sign-in/sign-out boundary; nothing here is ambient module state.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::ai::LlmGateway;
use crate::document::{DocumentManager, DocumentState};
use crate::error::{ChatError, ChatResult};
use crate::export;
use crate::picker::DocumentPicker;
use crate::session::SessionStore;
use crate::storage::KeyValueStorage;
use crate::types::{DocumentContext, Message, PickResult, Sender, UserIdentity};
use crate::user::{system_prompt, UserContextProvider};

/// How many prior messages a plain-generation prompt carries.
pub const HISTORY_WINDOW: usize = 10;

/// Outcome of a document attach: the picker may be dismissed.
#[derive(Clone, Debug, PartialEq)]
pub enum AttachOutcome {
    Canceled,
    Ready(DocumentContext),
}

pub struct ChatSession {
    identity: UserIdentity,
    store: SessionStore,
    documents: DocumentManager,
    gateway: Arc<dyn LlmGateway>,
    users: UserContextProvider,
    picker: Arc<dyn DocumentPicker>,
    busy: bool,
}

impl ChatSession {
    pub fn new(
        identity: UserIdentity,
        gateway: Arc<dyn LlmGateway>,
        storage: Arc<dyn KeyValueStorage>,
        picker: Arc<dyn DocumentPicker>,
    ) -> Self {
        Self {
            identity,
            store: SessionStore::new(),
            documents: DocumentManager::new(gateway.clone()),
            gateway,
            users: UserContextProvider::new(storage),
            picker,
            busy: false,
        }
    }

    /// Start the session: persist the identity, load this user's saved
    /// history, and seed a greeting if there is none. Storage failures are
    /// logged and the session starts empty; persistence never blocks a
    /// sign-in.
    pub async fn start(&mut self) {
        if let Err(err) = self.users.set_identity(&self.identity).await {
            warn!(%err, "failed to persist identity");
        }
        let history = match self.users.load_history(&self.identity.user_id).await {
            Ok(history) => history,
            Err(err) => {
                warn!(%err, "failed to load chat history, starting empty");
                Vec::new()
            }
        };
        if history.is_empty() {
            self.store.append(self.greeting());
            self.persist().await;
        } else {
            info!(
                user_id = %self.identity.user_id,
                count = history.len(),
                "restored chat history"
            );
            self.store.set_messages(history);
        }
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn document(&self) -> Option<&DocumentContext> {
        self.store.document()
    }

    pub fn document_state(&self) -> DocumentState {
        self.documents.state()
    }

    /// Tune the document polling schedule (tests).
    pub fn with_document_timing(mut self, interval: std::time::Duration, attempts: u32) -> Self {
        self.documents = self.documents.with_timing(interval, attempts);
        self
    }

    /// One user turn: append the user message, generate (file-grounded if
    /// a document is ready, plain otherwise) and append the assistant
    /// reply. On generation failure the user message stays and no
    /// assistant message is recorded; a retry is a fresh turn.
    pub async fn submit_turn(&mut self, text: &str) -> ChatResult<Message> {
        self.acquire()?;
        let result = self.submit_turn_inner(text).await;
        self.busy = false;
        result
    }

    async fn submit_turn_inner(&mut self, text: &str) -> ChatResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Validation("message text is required".into()));
        }

        let prior = self.store.messages().to_vec();
        self.store.append(Message::user(text));
        self.persist().await;

        let reply = match self.documents.ready_handle() {
            Some(handle) => {
                let handle = handle.to_string();
                self.gateway
                    .generate_with_file(&system_prompt(&self.identity), &handle, text)
                    .await
            }
            None => {
                self.gateway
                    .generate_text(&plain_prompt(&self.identity, &prior, text))
                    .await
            }
        };

        match reply {
            Ok(answer) => {
                let message = Message::assistant(answer);
                self.store.append(message.clone());
                self.persist().await;
                Ok(message)
            }
            Err(err) => {
                error!(%err, "generation failed, leaving history as-is");
                Err(err)
            }
        }
    }

    /// Pick a PDF, upload it and wait for remote processing, narrating
    /// progress with System messages. Picker cancellation is a no-op.
    pub async fn attach_document(&mut self) -> ChatResult<AttachOutcome> {
        self.acquire()?;
        let result = self.attach_document_inner().await;
        self.busy = false;
        result
    }

    async fn attach_document_inner(&mut self) -> ChatResult<AttachOutcome> {
        let picked = match self.picker.pick().await? {
            PickResult::Canceled => return Ok(AttachOutcome::Canceled),
            PickResult::Picked { path, name, .. } => (path, name),
        };
        let (path, file_name) = picked;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| ChatError::Upload(format!("failed to read {path}: {err}")))?;

        let ctx = self.documents.upload(&bytes, &file_name).await?;
        self.store.set_document(ctx);
        self.append_system(format!(
            "📄 Document \"**{file_name}**\" uploaded. Please wait while the PDF is processed..."
        ))
        .await;

        match self.documents.await_processing().await {
            Ok(ctx) => {
                self.store.set_document(ctx.clone());
                self.append_system(format!(
                    "✅ Document \"**{file_name}**\" is ready! You can now ask me any questions about this document."
                ))
                .await;
                Ok(AttachOutcome::Ready(ctx))
            }
            Err(err) => {
                self.store.clear_document();
                self.append_system(format!(
                    "⚠️ Processing of \"**{file_name}**\" failed: {err}"
                ))
                .await;
                Err(err)
            }
        }
    }

    /// Delete the session: best-effort remote cleanup, clear local state,
    /// persist an empty history, seed a fresh greeting. Idempotent; a
    /// second call performs no further remote cleanup.
    pub async fn delete_session(&mut self) -> ChatResult<()> {
        self.acquire()?;
        self.documents.detach().await;
        self.store.clear();
        if let Err(err) = self
            .users
            .save_history(&self.identity.user_id, &[])
            .await
        {
            warn!(%err, "failed to persist cleared history");
        }
        self.store.append(self.greeting());
        self.persist().await;
        self.busy = false;
        Ok(())
    }

    /// Sign out: tear down the document context, persist the history one
    /// last time and clear the stored identity.
    pub async fn logout(&mut self) -> ChatResult<()> {
        self.acquire()?;
        self.documents.detach().await;
        self.store.clear_document();
        self.persist().await;
        let result = self.users.clear_identity().await;
        self.busy = false;
        result
    }

    /// Render the current session as a shareable HTML transcript.
    pub fn export_transcript(&self) -> String {
        export::render_transcript(self.store.messages(), self.store.document())
    }

    fn greeting(&self) -> Message {
        Message::assistant(format!(
            "Hello {}! 👋 I'm BizAssist, ready to start a new chat.",
            self.identity.name
        ))
    }

    async fn append_system(&mut self, text: String) {
        self.store.append(Message::system(text));
        self.persist().await;
    }

    /// Persist the full history. Failures are logged and non-fatal: the
    /// in-memory copy stays authoritative for this process lifetime.
    async fn persist(&self) {
        if let Err(err) = self
            .users
            .save_history(&self.identity.user_id, self.store.messages())
            .await
        {
            warn!(%err, "failed to persist chat history");
        }
    }

    /// Pending-operation guard: one controller operation at a time.
    fn acquire(&mut self) -> ChatResult<()> {
        if self.busy {
            return Err(ChatError::Validation(
                "another operation is already in flight".into(),
            ));
        }
        self.busy = true;
        Ok(())
    }
}

/// Assemble the plain-generation prompt: system prompt, up to the last
/// [`HISTORY_WINDOW`] prior messages (oldest first, System messages
/// excluded), then the current question.
fn plain_prompt(identity: &UserIdentity, prior: &[Message], question: &str) -> String {
    let context: Vec<String> = prior
        .iter()
        .filter(|m| m.sender != Sender::System)
        .rev()
        .take(HISTORY_WINDOW)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|m| {
            let role = match m.sender {
                Sender::User => "User",
                _ => "Assistant",
            };
            format!("{role}: {}", m.text)
        })
        .collect();

    let history_block = if context.is_empty() {
        String::new()
    } else {
        format!("Previous conversation:\n{}\n\n", context.join("\n"))
    };

    format!(
        "{}\n\n{}Current question: {}\n\nPlease respond naturally and helpfully.",
        system_prompt(identity),
        history_block,
        question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn identity() -> UserIdentity {
        UserIdentity {
            user_id: "u-1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            login_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn plain_prompt_windows_history_oldest_first() {
        let prior: Vec<Message> = (0..15).map(|i| Message::user(format!("m{i}"))).collect();
        let prompt = plain_prompt(&identity(), &prior, "now");

        assert!(!prompt.contains("User: m4\n"));
        assert!(prompt.contains("User: m5"));
        assert!(prompt.contains("User: m14"));
        let older = prompt.find("User: m5").unwrap();
        let newer = prompt.find("User: m14").unwrap();
        assert!(older < newer);
        assert!(prompt.contains("Current question: now"));
    }

    #[test]
    fn plain_prompt_skips_system_messages() {
        let prior = vec![
            Message::user("hello"),
            Message::system("📄 uploaded"),
            Message::assistant("hi"),
        ];
        let prompt = plain_prompt(&identity(), &prior, "next");
        assert!(prompt.contains("User: hello"));
        assert!(prompt.contains("Assistant: hi"));
        assert!(!prompt.contains("uploaded"));
    }

    #[test]
    fn plain_prompt_without_history_has_no_context_block() {
        let prompt = plain_prompt(&identity(), &[], "first question");
        assert!(!prompt.contains("Previous conversation"));
        assert!(prompt.contains("Current question: first question"));
    }
}

//! User context: the signed-in identity and per-user chat-history
//! persistence over the durable key-value boundary.

use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::error::{ChatError, ChatResult};
use crate::storage::KeyValueStorage;
use crate::types::{Message, UserIdentity};

const IDENTITY_KEY: &str = "user_context";
const HISTORY_KEY_PREFIX: &str = "history:";

pub struct UserContextProvider {
    storage: Arc<dyn KeyValueStorage>,
}

impl UserContextProvider {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub async fn set_identity(&self, identity: &UserIdentity) -> ChatResult<()> {
        let json = serde_json::to_string(identity)
            .map_err(|err| ChatError::Persistence(format!("identity encode: {err}")))?;
        self.storage.set(IDENTITY_KEY, &json).await
    }

    pub async fn identity(&self) -> ChatResult<Option<UserIdentity>> {
        match self.storage.get(IDENTITY_KEY).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|err| ChatError::Persistence(format!("identity decode: {err}"))),
            None => Ok(None),
        }
    }

    pub async fn clear_identity(&self) -> ChatResult<()> {
        self.storage.remove(IDENTITY_KEY).await
    }

    /// Persist the full history for one user. Full overwrite, last writer
    /// wins: there is exactly one writer (this device).
    pub async fn save_history(&self, user_id: &str, messages: &[Message]) -> ChatResult<()> {
        let json = serde_json::to_string(messages)
            .map_err(|err| ChatError::Persistence(format!("history encode: {err}")))?;
        self.storage
            .set(&format!("{HISTORY_KEY_PREFIX}{user_id}"), &json)
            .await
    }

    /// Load the persisted history for one user; missing or unreadable
    /// history loads as empty.
    pub async fn load_history(&self, user_id: &str) -> ChatResult<Vec<Message>> {
        match self
            .storage
            .get(&format!("{HISTORY_KEY_PREFIX}{user_id}"))
            .await?
        {
            Some(json) => match serde_json::from_str(&json) {
                Ok(messages) => Ok(messages),
                Err(err) => {
                    warn!(user_id, %err, "stored history is unreadable, starting empty");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }
}

/// Personalization prompt assembled from the signed-in identity.
pub fn system_prompt(identity: &UserIdentity) -> String {
    let login = identity
        .login_time
        .format(&Rfc3339)
        .unwrap_or_else(|_| identity.login_time.to_string());
    format!(
        "You are BizAssist, a helpful business assistant AI. You are currently chatting with:\n\
         - Name: {name}\n\
         - Email: {email}\n\
         - User ID: {user_id}\n\
         - Login Time: {login}\n\n\
         Important instructions:\n\
         - When the user asks \"what is my name\" or \"who am I\", respond with their name: \"{name}\"\n\
         - When asked about their email, respond with: \"{email}\"\n\
         - Personalize your responses using their name when appropriate\n\
         - Remember all conversation context from this session\n\
         - Be professional, helpful, and friendly\n\n\
         The user may upload documents for analysis. When a document is uploaded, you can answer questions about its content.",
        name = identity.name,
        email = identity.email,
        user_id = identity.user_id,
    )
}

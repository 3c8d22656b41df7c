use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Who produced a message. System messages are informational (upload
/// progress, errors), rendered distinctly and excluded from LLM context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub sender: Sender,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            created_at: OffsetDateTime::now_utc(),
            sender,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text)
    }
}

/// Lifecycle of one document attempt. `Failed` is terminal; a fresh
/// attempt starts over from local file selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploading,
    ProcessingRemote,
    Ready,
    Failed,
}

/// Binding between a locally picked file and its provider-hosted
/// representation, used to ground generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub file_name: String,
    pub file_type: String,
    pub remote_file_id: Option<String>,
    pub remote_mime_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    pub status: DocumentStatus,
}

impl DocumentContext {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: "application/pdf".to_string(),
            remote_file_id: None,
            remote_mime_type: None,
            uploaded_at: OffsetDateTime::now_utc(),
            status: DocumentStatus::Uploading,
        }
    }
}

/// Identity captured once at sign-in. Partition key for chat history and
/// personalization input to the system prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub login_time: OffsetDateTime,
}

/// Result of a remote file upload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RemoteFile {
    pub handle: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Remote processing state reported by the provider. Unknown state strings
/// map to `Processing` so the poll keeps waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    Processing,
    Active,
    Failed,
}

/// Snapshot of a remote file returned by a status query.
#[derive(Clone, Debug, PartialEq)]
pub struct FileStatus {
    pub state: FileState,
    pub uri: Option<String>,
    pub mime_type: Option<String>,
}

/// Outcome of the platform document picker.
#[derive(Clone, Debug, PartialEq)]
pub enum PickResult {
    Canceled,
    Picked {
        path: String,
        name: String,
        size: Option<u64>,
        mime_type: Option<String>,
    },
}

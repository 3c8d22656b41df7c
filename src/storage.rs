//! Durable key-value boundary.
//!
//! String keys and values only. Used for the signed-in identity, per-user
//! chat history (`history:<userId>`) and the document-context cache.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{ChatError, ChatResult};

#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> ChatResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> ChatResult<()>;
    async fn remove(&self, key: &str) -> ChatResult<()>;
}

/// Sanitize a storage key for filesystem use.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(48)
        .collect()
}

/// File name for a storage key: the sanitized key for readability plus a
/// short digest of the raw key. Sanitization alone is lossy (`history:a`
/// and `history_a` would share a file, and user ids can be arbitrary
/// emails); the digest keeps distinct keys distinct.
fn file_name_for_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}-{}.json", sanitize_key(key), hex::encode(&digest[..8]))
}

/// File-backed storage: one JSON file per key under the platform's local
/// data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `<data_local_dir>/bizassist/session_data`.
    pub fn new() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("cache"))
            .join("bizassist")
            .join("session_data");
        Self { dir }
    }

    /// Storage rooted at an explicit directory (tests).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for_key(key))
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> ChatResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ChatError::Persistence(format!(
                "failed to read {key}: {err}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| ChatError::Persistence(format!("failed to create storage dir: {err}")))?;
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|err| ChatError::Persistence(format!("failed to write {key}: {err}")))
    }

    async fn remove(&self, key: &str) -> ChatResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ChatError::Persistence(format!(
                "failed to remove {key}: {err}"
            ))),
        }
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> ChatResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Persistence("storage poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Persistence("storage poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> ChatResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ChatError::Persistence("storage poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{file_name_for_key, sanitize_key};

    #[test]
    fn sanitizes_keys_for_filesystem() {
        assert_eq!(sanitize_key("user_context"), "user_context");
        assert_eq!(sanitize_key("history:alice"), "history_alice");
        assert_eq!(sanitize_key("a/b c!"), "a_b_c_");
    }

    #[test]
    fn file_names_are_deterministic() {
        assert_eq!(
            file_name_for_key("user_context"),
            file_name_for_key("user_context")
        );
        assert!(file_name_for_key("history:alice").starts_with("history_alice-"));
    }

    #[test]
    fn distinct_keys_that_sanitize_alike_get_distinct_files() {
        assert_ne!(
            file_name_for_key("history:alice"),
            file_name_for_key("history_alice")
        );
        assert_ne!(
            file_name_for_key("history:a.b@x.com"),
            file_name_for_key("history:a_b@x_com")
        );
    }

    #[test]
    fn long_keys_get_bounded_file_names() {
        let a = format!("history:{}a", "k".repeat(200));
        let b = format!("history:{}b", "k".repeat(200));
        assert!(file_name_for_key(&a).len() < 80);
        assert_ne!(file_name_for_key(&a), file_name_for_key(&b));
    }
}

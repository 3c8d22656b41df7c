//! Integration tests for the durable key-value boundary and the user
//! context provider built on top of it.

use std::sync::Arc;

use time::OffsetDateTime;

use bizassist::{FileStorage, KeyValueStorage, Message, UserContextProvider, UserIdentity};

fn file_storage() -> (tempfile::TempDir, Arc<FileStorage>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Arc::new(FileStorage::with_dir(dir.path()));
    (dir, storage)
}

fn identity() -> UserIdentity {
    UserIdentity {
        user_id: "user-7".into(),
        name: "Grace".into(),
        email: "grace@example.com".into(),
        login_time: OffsetDateTime::UNIX_EPOCH,
    }
}

mod storage_tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (_dir, storage) = file_storage();
        storage.set("greeting", "hello").await.unwrap();
        assert_eq!(storage.get("greeting").await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let (_dir, storage) = file_storage();
        assert_eq!(storage.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let (_dir, storage) = file_storage();
        storage.set("k", "first").await.unwrap();
        storage.set("k", "second").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn remove_deletes_and_tolerates_missing() {
        let (_dir, storage) = file_storage();
        storage.set("k", "v").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
        // Removing again is fine.
        storage.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn keys_with_separators_are_stored_safely() {
        let (_dir, storage) = file_storage();
        storage.set("history:alice", "[]").await.unwrap();
        assert_eq!(
            storage.get("history:alice").await.unwrap().as_deref(),
            Some("[]")
        );
    }
}

mod user_context_tests {
    use super::*;

    #[tokio::test]
    async fn identity_round_trips_and_clears() {
        let (_dir, storage) = file_storage();
        let users = UserContextProvider::new(storage);

        assert_eq!(users.identity().await.unwrap(), None);
        users.set_identity(&identity()).await.unwrap();
        assert_eq!(users.identity().await.unwrap(), Some(identity()));
        users.clear_identity().await.unwrap();
        assert_eq!(users.identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn history_round_trips_in_order() {
        let (_dir, storage) = file_storage();
        let users = UserContextProvider::new(storage);

        let messages = vec![
            Message::user("first"),
            Message::assistant("second"),
            Message::system("third"),
        ];
        users.save_history("user-7", &messages).await.unwrap();
        let loaded = users.load_history("user-7").await.unwrap();
        assert_eq!(loaded, messages);
    }

    #[tokio::test]
    async fn histories_are_partitioned_by_user() {
        let (_dir, storage) = file_storage();
        let users = UserContextProvider::new(storage);

        users
            .save_history("alice", &[Message::user("from alice")])
            .await
            .unwrap();
        users
            .save_history("bob", &[Message::user("from bob")])
            .await
            .unwrap();

        assert_eq!(users.load_history("alice").await.unwrap()[0].text, "from alice");
        assert_eq!(users.load_history("bob").await.unwrap()[0].text, "from bob");
    }

    #[tokio::test]
    async fn save_is_full_overwrite() {
        let (_dir, storage) = file_storage();
        let users = UserContextProvider::new(storage);

        users
            .save_history("user-7", &[Message::user("old"), Message::assistant("older")])
            .await
            .unwrap();
        users.save_history("user-7", &[]).await.unwrap();
        assert!(users.load_history("user-7").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_history_loads_empty() {
        let (_dir, storage) = file_storage();
        let users = UserContextProvider::new(storage);
        assert!(users.load_history("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_history_loads_empty_instead_of_failing() {
        let (_dir, storage) = file_storage();
        storage.set("history:user-7", "not json").await.unwrap();
        let users = UserContextProvider::new(storage);
        assert!(users.load_history("user-7").await.unwrap().is_empty());
    }
}

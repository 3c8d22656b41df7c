//! Document context manager.
//!
//! Owns the lifecycle of one uploaded document: selection, upload, remote
//! processing poll, ready/failed, teardown. At most one attempt is in
//! flight per session; a failed attempt is terminal and a fresh one starts
//! over from file selection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::ai::LlmGateway;
use crate::error::{ChatError, ChatResult};
use crate::types::{DocumentContext, DocumentStatus, FileState};

pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const MAX_POLL_ATTEMPTS: u32 = 30;

/// Manager-level state. `Idle` means no document attempt exists; the
/// remaining states mirror the bound context's status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentState {
    Idle,
    Uploading,
    ProcessingRemote,
    Ready,
    Failed,
}

pub struct DocumentManager {
    gateway: Arc<dyn LlmGateway>,
    context: Option<DocumentContext>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl DocumentManager {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            context: None,
            poll_interval: POLL_INTERVAL,
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    /// Override the polling schedule (tests).
    pub fn with_timing(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_attempts = max_attempts;
        self
    }

    pub fn state(&self) -> DocumentState {
        match &self.context {
            None => DocumentState::Idle,
            Some(ctx) => match ctx.status {
                DocumentStatus::Uploading => DocumentState::Uploading,
                DocumentStatus::ProcessingRemote => DocumentState::ProcessingRemote,
                DocumentStatus::Ready => DocumentState::Ready,
                DocumentStatus::Failed => DocumentState::Failed,
            },
        }
    }

    /// Snapshot for the controller's generation-mode decision.
    pub fn context(&self) -> Option<&DocumentContext> {
        self.context.as_ref()
    }

    /// The bound remote handle, once the document is ready.
    pub fn ready_handle(&self) -> Option<&str> {
        match &self.context {
            Some(ctx) if ctx.status == DocumentStatus::Ready => ctx.remote_file_id.as_deref(),
            _ => None,
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.state(),
            DocumentState::Uploading | DocumentState::ProcessingRemote
        )
    }

    /// Start a new document attempt: upload the picked file's bytes and
    /// move to `ProcessingRemote`. Starting one while another is uploading
    /// or processing is rejected; a previous `Ready` or `Failed` attempt
    /// is replaced.
    pub async fn upload(&mut self, bytes: &[u8], file_name: &str) -> ChatResult<DocumentContext> {
        if self.is_busy() {
            return Err(ChatError::Validation(
                "a document upload is already in progress".into(),
            ));
        }

        let mut ctx = DocumentContext::new(file_name);
        self.context = Some(ctx.clone());

        let uploaded = match self.gateway.upload(bytes, file_name).await {
            Ok(file) => file,
            Err(err) => {
                // Nothing was created remotely; no cleanup needed.
                self.mark_failed();
                return Err(err);
            }
        };

        info!(file_name, handle = %uploaded.handle, "document uploaded, waiting for processing");
        ctx.remote_file_id = Some(uploaded.handle.clone());
        ctx.remote_mime_type = uploaded.mime_type.clone();
        ctx.status = DocumentStatus::ProcessingRemote;
        self.context = Some(ctx.clone());
        Ok(ctx)
    }

    /// Wait for the in-flight attempt to finish remote processing. On
    /// success the context is `Ready` and grounded generation becomes
    /// available; on failure or timeout the orphaned remote file is
    /// deleted (best effort) before the error is surfaced.
    pub async fn await_processing(&mut self) -> ChatResult<DocumentContext> {
        let handle = match &self.context {
            Some(ctx) if ctx.status == DocumentStatus::ProcessingRemote => ctx
                .remote_file_id
                .clone()
                .ok_or_else(|| ChatError::Validation("processing document has no handle".into()))?,
            _ => {
                return Err(ChatError::Validation(
                    "no document is awaiting processing".into(),
                ));
            }
        };

        match self.wait_for_active(&handle).await {
            Ok(()) => {
                let ctx = match self.context.as_mut() {
                    Some(ctx) => {
                        ctx.status = DocumentStatus::Ready;
                        ctx.clone()
                    }
                    None => return Err(ChatError::Validation("document attempt vanished".into())),
                };
                info!(handle = %handle, "document is ready");
                Ok(ctx)
            }
            Err(err) => {
                // Never leave a dangling remote resource silently.
                if !self.gateway.delete_file(&handle).await {
                    warn!(handle = %handle, "cleanup of failed document did not succeed");
                }
                self.mark_failed();
                Err(err)
            }
        }
    }

    /// Poll the remote processing state on a fixed interval until it is
    /// active, it fails, or the attempt budget runs out. Transient poll
    /// errors retry in place except on the final attempt.
    async fn wait_for_active(&self, handle: &str) -> ChatResult<()> {
        for attempt in 1..=self.max_attempts {
            match self.gateway.file_status(handle).await {
                Ok(status) => match status.state {
                    FileState::Active => return Ok(()),
                    FileState::Failed => {
                        return Err(ChatError::ProcessingFailed(format!(
                            "remote processing failed for {handle}"
                        )));
                    }
                    FileState::Processing => {
                        info!(handle, attempt, "file still processing");
                    }
                },
                Err(err) => {
                    if attempt == self.max_attempts {
                        return Err(err);
                    }
                    warn!(handle, attempt, %err, "status poll failed, retrying");
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Err(ChatError::ProcessingTimeout(format!(
            "{handle} did not become active within {} attempts",
            self.max_attempts
        )))
    }

    fn mark_failed(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.status = DocumentStatus::Failed;
            // Any remote file for this attempt is gone by now (cleaned up,
            // or never created); dropping the handle keeps a later detach
            // from deleting it a second time.
            ctx.remote_file_id = None;
        }
    }

    /// Tear the context down to `Idle`. Remote cleanup is best-effort and
    /// attempted first; local state reaches `Idle` regardless. Calling
    /// with no bound document is a no-op and issues no delete.
    pub async fn detach(&mut self) {
        if let Some(ctx) = self.context.take() {
            if let Some(handle) = &ctx.remote_file_id {
                if !self.gateway.delete_file(handle).await {
                    warn!(handle = %handle, "remote cleanup failed during detach");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileStatus, RemoteFile};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted gateway: one entry per status poll.
    struct ScriptedGateway {
        upload_result: Option<ChatError>,
        polls: Mutex<Vec<ChatResult<FileState>>>,
        deletes: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(polls: Vec<ChatResult<FileState>>) -> Self {
            Self {
                upload_result: None,
                polls: Mutex::new(polls),
                deletes: AtomicUsize::new(0),
            }
        }

        fn failing_upload(err: ChatError) -> Self {
            Self {
                upload_result: Some(err),
                polls: Mutex::new(Vec::new()),
                deletes: AtomicUsize::new(0),
            }
        }

        fn delete_count(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmGateway for ScriptedGateway {
        async fn upload(&self, _bytes: &[u8], _name: &str) -> ChatResult<RemoteFile> {
            match &self.upload_result {
                Some(err) => Err(err.clone()),
                None => Ok(RemoteFile {
                    handle: "files/test".into(),
                    mime_type: Some("application/pdf".into()),
                    size_bytes: Some(42),
                }),
            }
        }

        async fn file_status(&self, _handle: &str) -> ChatResult<FileStatus> {
            let mut polls = self.polls.lock().unwrap();
            let next = if polls.is_empty() {
                Ok(FileState::Processing)
            } else {
                polls.remove(0)
            };
            next.map(|state| FileStatus {
                state,
                uri: Some("https://files.example/test".into()),
                mime_type: Some("application/pdf".into()),
            })
        }

        async fn delete_file(&self, _handle: &str) -> bool {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn generate_text(&self, _prompt: &str) -> ChatResult<String> {
            unreachable!("not used by the document manager")
        }

        async fn generate_with_file(
            &self,
            _system: &str,
            _handle: &str,
            _question: &str,
        ) -> ChatResult<String> {
            unreachable!("not used by the document manager")
        }
    }

    fn manager(gateway: Arc<ScriptedGateway>) -> DocumentManager {
        DocumentManager::new(gateway).with_timing(Duration::ZERO, 5)
    }

    async fn attach(
        mgr: &mut DocumentManager,
        bytes: &[u8],
        name: &str,
    ) -> ChatResult<DocumentContext> {
        mgr.upload(bytes, name).await?;
        mgr.await_processing().await
    }

    #[tokio::test]
    async fn reaches_ready_when_remote_becomes_active() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(FileState::Processing),
            Ok(FileState::Processing),
            Ok(FileState::Active),
        ]));
        let mut mgr = manager(gateway.clone());

        let ctx = attach(&mut mgr, b"%PDF-", "report.pdf").await.unwrap();
        assert_eq!(ctx.status, DocumentStatus::Ready);
        assert_eq!(ctx.remote_file_id.as_deref(), Some("files/test"));
        assert_eq!(mgr.state(), DocumentState::Ready);
        assert_eq!(mgr.ready_handle(), Some("files/test"));
        assert_eq!(gateway.delete_count(), 0);
    }

    #[tokio::test]
    async fn remote_failure_deletes_handle_exactly_once() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(FileState::Failed)]));
        let mut mgr = manager(gateway.clone());

        let err = attach(&mut mgr, b"%PDF-", "report.pdf").await.unwrap_err();
        assert!(matches!(err, ChatError::ProcessingFailed(_)));
        assert_eq!(mgr.state(), DocumentState::Failed);
        assert_eq!(gateway.delete_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_times_out_and_cleans_up() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let mut mgr = manager(gateway.clone());

        let err = attach(&mut mgr, b"%PDF-", "slow.pdf").await.unwrap_err();
        assert!(matches!(err, ChatError::ProcessingTimeout(_)));
        assert_eq!(gateway.delete_count(), 1);
    }

    #[tokio::test]
    async fn transient_poll_errors_retry_in_place() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(ChatError::ProcessingFailed("transient".into())),
            Ok(FileState::Active),
        ]));
        let mut mgr = manager(gateway.clone());

        let ctx = attach(&mut mgr, b"%PDF-", "flaky.pdf").await.unwrap();
        assert_eq!(ctx.status, DocumentStatus::Ready);
        assert_eq!(gateway.delete_count(), 0);
    }

    #[tokio::test]
    async fn final_attempt_poll_error_is_surfaced() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(ChatError::ProcessingFailed("down".into())),
            Err(ChatError::ProcessingFailed("down".into())),
        ]));
        let mut mgr = DocumentManager::new(gateway.clone()).with_timing(Duration::ZERO, 2);

        let err = attach(&mut mgr, b"%PDF-", "down.pdf").await.unwrap_err();
        assert!(matches!(err, ChatError::ProcessingFailed(_)));
        assert_eq!(gateway.delete_count(), 1);
    }

    #[tokio::test]
    async fn upload_failure_needs_no_remote_cleanup() {
        let gateway = Arc::new(ScriptedGateway::failing_upload(ChatError::Upload(
            "rejected".into(),
        )));
        let mut mgr = manager(gateway.clone());

        let err = attach(&mut mgr, b"%PDF-", "bad.pdf").await.unwrap_err();
        assert!(matches!(err, ChatError::Upload(_)));
        assert_eq!(mgr.state(), DocumentState::Failed);
        assert_eq!(gateway.delete_count(), 0);
    }

    #[tokio::test]
    async fn failed_attempt_allows_a_fresh_one() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(FileState::Failed),
            Ok(FileState::Active),
        ]));
        let mut mgr = manager(gateway.clone());

        assert!(attach(&mut mgr, b"%PDF-", "first.pdf").await.is_err());
        let ctx = attach(&mut mgr, b"%PDF-", "second.pdf").await.unwrap();
        assert_eq!(ctx.file_name, "second.pdf");
        assert_eq!(mgr.state(), DocumentState::Ready);
    }

    #[tokio::test]
    async fn second_upload_rejected_while_processing() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(FileState::Active)]));
        let mut mgr = manager(gateway.clone());

        mgr.upload(b"%PDF-", "first.pdf").await.unwrap();
        assert_eq!(mgr.state(), DocumentState::ProcessingRemote);

        let err = mgr.upload(b"%PDF-", "second.pdf").await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));

        let ctx = mgr.await_processing().await.unwrap();
        assert_eq!(ctx.file_name, "first.pdf");
    }

    #[tokio::test]
    async fn detach_after_failed_attempt_does_not_delete_again() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(FileState::Failed)]));
        let mut mgr = manager(gateway.clone());

        attach(&mut mgr, b"%PDF-", "report.pdf").await.unwrap_err();
        assert_eq!(gateway.delete_count(), 1);

        mgr.detach().await;
        assert_eq!(mgr.state(), DocumentState::Idle);
        assert_eq!(gateway.delete_count(), 1);
    }

    #[tokio::test]
    async fn detach_is_idempotent() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(FileState::Active)]));
        let mut mgr = manager(gateway.clone());
        attach(&mut mgr, b"%PDF-", "report.pdf").await.unwrap();

        mgr.detach().await;
        assert_eq!(mgr.state(), DocumentState::Idle);
        mgr.detach().await;
        assert_eq!(gateway.delete_count(), 1);
    }
}

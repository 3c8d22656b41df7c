use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{extract_text, LlmGateway};
use crate::error::{ChatError, ChatResult};
use crate::types::{FileState, FileStatus, RemoteFile};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PDF_MIME: &str = "application/pdf";

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Build the client from environment configuration. `GEMINI_API_KEY`
    /// is required; model and base URL have defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(base_url, model, api_key))
    }

    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    async fn generate_content(&self, parts: Vec<Value>) -> ChatResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = json!({
            "contents": [{"role": "user", "parts": parts}]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ChatError::Generation(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ChatError::Generation(err.to_string()))?;

        if !status.is_success() {
            return Err(ChatError::Generation(format!(
                "provider error {status}: {text}"
            )));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => Ok(extract_text(&parsed)),
            // Non-JSON success body: hand it through as-is.
            Err(_) => Ok(text),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilePayload {
    name: Option<String>,
    uri: Option<String>,
    mime_type: Option<String>,
    size_bytes: Option<String>,
    state: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: Option<FilePayload>,
}

fn parse_file_state(state: Option<&str>) -> FileState {
    match state {
        Some("ACTIVE") => FileState::Active,
        Some("FAILED") => FileState::Failed,
        // PROCESSING and anything unrecognized: keep waiting.
        _ => FileState::Processing,
    }
}

#[async_trait]
impl LlmGateway for GeminiClient {
    async fn upload(&self, bytes: &[u8], display_name: &str) -> ChatResult<RemoteFile> {
        let url = format!(
            "{}/upload/v1beta/files?key={}",
            self.base_url, self.api_key
        );
        let metadata = json!({
            "file": {"display_name": display_name, "mime_type": PDF_MIME}
        });
        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str("application/json").map_err(
                    |err| ChatError::Upload(format!("metadata part: {err}")),
                )?,
            )
            .part(
                "file",
                Part::bytes(bytes.to_vec())
                    .file_name(display_name.to_string())
                    .mime_str(PDF_MIME)
                    .map_err(|err| ChatError::Upload(format!("file part: {err}")))?,
            );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| ChatError::Upload(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ChatError::Upload(err.to_string()))?;

        if !status.is_success() {
            return Err(ChatError::Upload(format!(
                "upload rejected {status}: {text}"
            )));
        }

        let parsed: UploadResponse = serde_json::from_str(&text)
            .map_err(|err| ChatError::Upload(format!("unexpected upload response: {err}")))?;
        let file = parsed
            .file
            .ok_or_else(|| ChatError::Upload(format!("upload response has no file: {text}")))?;
        let handle = file
            .name
            .ok_or_else(|| ChatError::Upload("upload response has no file name".into()))?;

        Ok(RemoteFile {
            handle,
            mime_type: file.mime_type,
            size_bytes: file.size_bytes.and_then(|s| s.parse().ok()),
        })
    }

    async fn file_status(&self, handle: &str) -> ChatResult<FileStatus> {
        let url = format!("{}/v1beta/{}?key={}", self.base_url, handle, self.api_key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ChatError::ProcessingFailed(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ChatError::ProcessingFailed(err.to_string()))?;

        if !status.is_success() {
            return Err(ChatError::ProcessingFailed(format!(
                "status query failed {status}: {text}"
            )));
        }

        let file: FilePayload = serde_json::from_str(&text)
            .map_err(|err| ChatError::ProcessingFailed(format!("unexpected status body: {err}")))?;
        Ok(FileStatus {
            state: parse_file_state(file.state.as_deref()),
            uri: file.uri,
            mime_type: file.mime_type,
        })
    }

    async fn delete_file(&self, handle: &str) -> bool {
        let url = format!("{}/v1beta/{}?key={}", self.base_url, handle, self.api_key);
        match self.client.delete(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(handle, status = %response.status(), "remote file delete rejected");
                false
            }
            Err(err) => {
                warn!(handle, %err, "remote file delete failed");
                false
            }
        }
    }

    async fn generate_text(&self, prompt: &str) -> ChatResult<String> {
        self.generate_content(vec![json!({"text": prompt})]).await
    }

    async fn generate_with_file(
        &self,
        system_prompt: &str,
        handle: &str,
        question: &str,
    ) -> ChatResult<String> {
        // The file part needs the provider-reported uri and mime type.
        let file = self.file_status(handle).await?;
        if file.state != FileState::Active {
            return Err(ChatError::ProcessingFailed(format!(
                "file {handle} is not active"
            )));
        }

        let file_part = match (&file.uri, &file.mime_type) {
            (Some(uri), Some(mime)) => json!({
                "file_data": {"file_uri": uri, "mime_type": mime}
            }),
            _ => json!({
                "file_data": {"file_uri": handle, "mime_type": PDF_MIME}
            }),
        };

        self.generate_content(vec![
            json!({"text": system_prompt}),
            file_part,
            json!({"text": format!("\n\nUser question: {question}")}),
        ])
        .await
    }
}

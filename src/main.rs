//! Interactive terminal front end for the BizAssist chat core.
//!
//! Commands: `/attach <path>` uploads a PDF, `/delete` wipes the session,
//! `/export <file>` writes the HTML transcript, `/quit` exits. Anything
//! else is a chat turn.

use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};

use bizassist::{
    AttachOutcome, ChatError, ChatResult, ChatSession, DocumentPicker, FileStorage, GeminiClient,
    PickResult, UserIdentity,
};

/// Picker fed by the `/attach` command instead of a platform dialog.
struct CliPicker {
    next: Mutex<Option<String>>,
}

impl CliPicker {
    fn new() -> Self {
        Self {
            next: Mutex::new(None),
        }
    }

    fn queue(&self, path: String) {
        *self.next.lock().expect("picker poisoned") = Some(path);
    }
}

#[async_trait]
impl DocumentPicker for CliPicker {
    async fn pick(&self) -> ChatResult<PickResult> {
        let Some(path) = self.next.lock().expect("picker poisoned").take() else {
            return Ok(PickResult::Canceled);
        };
        let name = Path::new(&path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        Ok(PickResult::Picked {
            path,
            name,
            size: None,
            mime_type: Some("application/pdf".to_string()),
        })
    }
}

fn identity_from_env() -> UserIdentity {
    let name = std::env::var("BIZASSIST_NAME").unwrap_or_else(|_| "Guest".to_string());
    let email =
        std::env::var("BIZASSIST_EMAIL").unwrap_or_else(|_| "guest@example.com".to_string());
    UserIdentity {
        user_id: email.clone(),
        name,
        email,
        login_time: OffsetDateTime::now_utc(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env for desktop dev; real env always wins.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bizassist=info".into()),
        )
        .init();

    let gateway = Arc::new(GeminiClient::from_env()?);
    let storage = Arc::new(FileStorage::new());
    let picker = Arc::new(CliPicker::new());

    let mut session = ChatSession::new(
        identity_from_env(),
        gateway,
        storage,
        picker.clone(),
    );
    session.start().await;

    for message in session.messages() {
        println!("[{:?}] {}", message.sender, message.text);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print!("> ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        match line.as_str() {
            "/quit" => break,
            "/delete" => {
                session.delete_session().await?;
                println!("Session deleted.");
                for message in session.messages() {
                    println!("[{:?}] {}", message.sender, message.text);
                }
            }
            _ if line.starts_with("/attach ") => {
                picker.queue(line["/attach ".len()..].trim().to_string());
                match session.attach_document().await {
                    Ok(AttachOutcome::Ready(ctx)) => {
                        println!("Document \"{}\" is ready.", ctx.file_name)
                    }
                    Ok(AttachOutcome::Canceled) => println!("No document selected."),
                    Err(err) => println!("Attach failed: {err}"),
                }
            }
            _ if line.starts_with("/export ") => {
                let target = line["/export ".len()..].trim();
                tokio::fs::write(target, session.export_transcript()).await?;
                println!("Transcript written to {target}.");
            }
            "" => {}
            _ => match session.submit_turn(&line).await {
                Ok(reply) => println!("BizAssist: {}", reply.text),
                Err(ChatError::Validation(msg)) => println!("({msg})"),
                Err(err) => println!("Error: {err}"),
            },
        }
        print!("> ");
        std::io::stdout().flush()?;
    }

    session.logout().await?;
    Ok(())
}

//! Typed surface of the remote assistant service. Payload schemas are
//! explicit; anything that does not deserialize maps to
//! `AssistantError::MalformedResponse` at the client boundary.

use super::error::AssistantError;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedThread {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub usage: Option<RunUsage>,
}

impl RunObject {
    /// Remote failure detail when the service provides one.
    pub fn error_detail(&self) -> Option<String> {
        self.last_error.as_ref().and_then(|e| e.message.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunUsage {
    #[serde(default)]
    pub total_tokens: i32,
}

/// Run lifecycle as the poll loop sees it: queued and in_progress are the
/// only active states; everything else is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl RunStatus {
    pub fn parse(raw: &str) -> RunStatus {
        match raw {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            other => RunStatus::Other(other.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub role: String,
    pub content: Vec<MessageContentPart>,
}

impl ThreadMessage {
    /// Concatenated text content; empty when the message carries no text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContentPart::Text { text } => Some(text.value.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContentPart {
    Text { text: MessageText },
    ImageFile { image_file: serde_json::Value },
    ImageUrl { image_url: serde_json::Value },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
    pub value: String,
}

/// Client-side protocol against the remote assistant service. One stateless
/// HTTP round trip per call, each with its own network timeout.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_thread(&self) -> Result<CreatedThread, AssistantError>;

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<(), AssistantError>;

    async fn create_run(&self, thread_id: &str) -> Result<RunObject, AssistantError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, AssistantError>;

    /// Messages on the thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError>;

    /// Short-form completion used only for title summarization.
    async fn summarize(&self, transcript: &str) -> Result<String, AssistantError>;
}

//! Extraction of the assistant's reply from a completed run: newest assistant
//! message on the thread, plus token and latency accounting.

use super::api::{AssistantApi, RunObject, ThreadMessage};
use super::error::AssistantError;
use std::time::Instant;

const FALLBACK_MODEL: &str = "assistant";

#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub content: String,
    pub tokens_used: i32,
    pub model: String,
    pub response_time_ms: i32,
}

/// Pull the newest assistant message off the thread and validate it carries
/// usable text. `started` is the instant the user message was submitted, so
/// the latency figure is wall-clock and comparable across remote services.
pub async fn extract_reply(
    api: &dyn AssistantApi,
    thread_id: &str,
    run: &RunObject,
    started: Instant,
) -> Result<AssistantReply, AssistantError> {
    let messages = api.list_messages(thread_id).await?;
    let reply = newest_assistant_text(&messages).ok_or(AssistantError::MalformedResponse)?;

    Ok(AssistantReply {
        content: reply,
        tokens_used: run.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
        model: run
            .model
            .clone()
            .unwrap_or_else(|| FALLBACK_MODEL.to_string()),
        response_time_ms: started.elapsed().as_millis() as i32,
    })
}

/// Messages arrive newest first; the first assistant message with non-empty
/// text is the reply to the run that just completed.
fn newest_assistant_text(messages: &[ThreadMessage]) -> Option<String> {
    messages
        .iter()
        .find(|message| message.role == "assistant")
        .map(|message| message.text())
        .filter(|text| !text.trim().is_empty())
}

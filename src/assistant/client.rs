//! reqwest implementation of [`AssistantApi`] against an OpenAI-compatible
//! assistant service (threads/runs plus a chat-completion call for titles).

use super::api::{AssistantApi, CreatedThread, RunObject, ThreadMessage};
use super::error::AssistantError;
use crate::config::AssistantConfig;
use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, trace};

const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");
const SUMMARY_MAX_TOKENS: u32 = 30;

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct OpenAiAssistantClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    assistant_id: String,
    summary_model: String,
}

impl OpenAiAssistantClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        if config.api_key.trim().is_empty() {
            return Err(AssistantError::Configuration(
                "assistant API key is empty".to_string(),
            ));
        }
        if config.assistant_id.trim().is_empty() {
            return Err(AssistantError::Configuration(
                "assistant id is empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(OpenAiAssistantClient {
            http,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            assistant_id: config.assistant_id.clone(),
            summary_model: config.summary_model.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Turn a non-2xx response into an `Api` error, keeping a bounded body
    /// snippet for the logs and never forwarding it to callers.
    async fn check(&self, response: Response, context: &str) -> Result<Response, AssistantError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        error!("Assistant API {} failed with {}: {}", context, status, snippet);
        Err(AssistantError::Api {
            status: status.as_u16(),
            message: format!("{} returned {}", context, status),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
        context: &str,
    ) -> Result<T, AssistantError> {
        response.json::<T>().await.map_err(|e| {
            error!("Assistant API {} returned unexpected shape: {}", context, e);
            AssistantError::MalformedResponse
        })
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<CreatedThread, AssistantError> {
        let response = self
            .http
            .post(self.url("/threads"))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
            .json(&json!({}))
            .send()
            .await?;
        let response = self.check(response, "create-thread").await?;
        let thread: CreatedThread = self.decode(response, "create-thread").await?;
        trace!("Created remote thread {}", thread.id);
        Ok(thread)
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<(), AssistantError> {
        let response = self
            .http
            .post(self.url(&format!("/threads/{}/messages", thread_id)))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
            .json(&json!({ "role": "user", "content": content }))
            .send()
            .await?;
        self.check(response, "add-message").await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str) -> Result<RunObject, AssistantError> {
        let response = self
            .http
            .post(self.url(&format!("/threads/{}/runs", thread_id)))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
            .json(&json!({ "assistant_id": self.assistant_id }))
            .send()
            .await?;
        let response = self.check(response, "create-run").await?;
        self.decode(response, "create-run").await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, AssistantError> {
        let response = self
            .http
            .get(self.url(&format!("/threads/{}/runs/{}", thread_id, run_id)))
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
            .send()
            .await?;
        let response = self.check(response, "get-run").await?;
        self.decode(response, "get-run").await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError> {
        let response = self
            .http
            .get(self.url(&format!("/threads/{}/messages", thread_id)))
            .query(&[("order", "desc"), ("limit", "20")])
            .bearer_auth(&self.api_key)
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
            .send()
            .await?;
        let response = self.check(response, "list-messages").await?;
        let listing: ListMessagesResponse = self.decode(response, "list-messages").await?;
        Ok(listing.data)
    }

    async fn summarize(&self, transcript: &str) -> Result<String, AssistantError> {
        let body = json!({
            "model": self.summary_model,
            "messages": [
                {
                    "role": "system",
                    "content": "Summarize this conversation in 6 words or fewer. Do not use quotation marks."
                },
                { "role": "user", "content": transcript }
            ],
            "max_tokens": SUMMARY_MAX_TOKENS,
            "temperature": 0.5
        });

        let response = self
            .http
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = self.check(response, "summarize").await?;
        let completion: ChatCompletionResponse = self.decode(response, "summarize").await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AssistantError::MalformedResponse)
    }
}

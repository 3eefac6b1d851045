//! The assistant orchestrator: one inbound chat message in, one durable,
//! ordered conversation turn pair out.

use super::api::AssistantApi;
use super::error::AssistantError;
use super::extract::extract_reply;
use super::runs::RunExecutor;
use super::sessions::{SessionDirectory, SessionOverview};
use super::threads::ThreadRegistry;
use super::titles::TitleGenerator;
use crate::config::AssistantConfig;
use crate::db::DBConnection;
use crate::models::assistant_turns::{AssistantTurn, NewAssistantTurn};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Upper bound on a single turn's content, keeping remote context growth in
/// check. Enforced again at the web boundary for a clean 400.
pub const MAX_MESSAGE_BYTES: usize = 10 * 1024;

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub assistant_message: String,
    pub tokens_used: i32,
    pub model: String,
    pub response_time_ms: i32,
    pub conversation: Vec<AssistantTurn>,
}

pub struct AssistantService {
    db: Arc<dyn DBConnection + Send + Sync>,
    threads: ThreadRegistry,
    runs: RunExecutor,
    titles: TitleGenerator,
    directory: SessionDirectory,
    api: Arc<dyn AssistantApi>,
}

impl AssistantService {
    pub fn new(
        db: Arc<dyn DBConnection + Send + Sync>,
        api: Arc<dyn AssistantApi>,
        config: &AssistantConfig,
    ) -> Self {
        AssistantService {
            threads: ThreadRegistry::new(db.clone(), api.clone(), config.always_fresh_thread),
            runs: RunExecutor::new(api.clone(), config.poll_interval, config.poll_attempts),
            titles: TitleGenerator::new(db.clone(), api.clone()),
            directory: SessionDirectory::new(db.clone()),
            db,
            api,
        }
    }

    /// Drive one user message through the full protocol: thread resolution,
    /// remote submission, durable user turn, run polling, extraction, durable
    /// assistant turn.
    ///
    /// The user turn is persisted before the run starts, so a crash mid-run
    /// loses only the assistant's reply, which the user can re-request.
    pub async fn send_message(
        &self,
        user_id: Uuid,
        message: &str,
        session_id: Option<String>,
    ) -> Result<ChatOutcome, AssistantError> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let started = Instant::now();

        match self.run_turn(user_id, message, &session_id, started).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    "Assistant turn failed for user {} session {} after {}ms: {}",
                    user_id,
                    session_id,
                    started.elapsed().as_millis(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn run_turn(
        &self,
        user_id: Uuid,
        message: &str,
        session_id: &str,
        started: Instant,
    ) -> Result<ChatOutcome, AssistantError> {
        let thread_id = self.threads.get_or_create(user_id, session_id).await?;
        let title = self.db.get_session_title(user_id, session_id)?;

        // Remote submission first: if it fails, nothing is persisted and the
        // store never holds a user turn without a chance of a reply.
        self.api.add_message(&thread_id, message).await?;
        self.db.insert_turn(NewAssistantTurn::user(
            user_id,
            session_id,
            &thread_id,
            message,
            title.as_deref(),
        ))?;

        let run = self.runs.start_and_poll(&thread_id).await?;
        let reply = extract_reply(self.api.as_ref(), &thread_id, &run, started).await?;

        self.db.insert_turn(NewAssistantTurn::assistant(
            user_id,
            session_id,
            &thread_id,
            &reply.content,
            reply.tokens_used,
            &reply.model,
            reply.response_time_ms,
            title.as_deref(),
        ))?;

        info!(
            "Assistant turn completed for user {} session {}: {} tokens in {}ms ({})",
            user_id, session_id, reply.tokens_used, reply.response_time_ms, reply.model
        );

        let conversation = self.visible_turns(user_id, session_id)?;
        Ok(ChatOutcome {
            session_id: session_id.to_string(),
            assistant_message: reply.content,
            tokens_used: reply.tokens_used,
            model: reply.model,
            response_time_ms: reply.response_time_ms,
            conversation,
        })
    }

    pub fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionOverview>, AssistantError> {
        self.directory.list_sessions(user_id)
    }

    pub fn get_history(
        &self,
        user_id: Uuid,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Option<Vec<AssistantTurn>>, AssistantError> {
        self.directory.get_history(user_id, session_id, limit)
    }

    pub fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<bool, AssistantError> {
        self.directory.delete_session(user_id, session_id)
    }

    pub async fn generate_title(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<(), AssistantError> {
        self.titles.generate(user_id, session_id).await
    }

    fn visible_turns(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<AssistantTurn>, AssistantError> {
        Ok(self
            .db
            .get_session_turns(user_id, session_id)?
            .into_iter()
            .filter(|turn| !turn.is_thread_marker())
            .collect())
    }
}

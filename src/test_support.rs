//! In-memory fakes for exercising the orchestrator without Postgres or the
//! remote assistant service.

use crate::assistant::api::{
    AssistantApi, CreatedThread, MessageContentPart, MessageText, RunError, RunObject, RunUsage,
    ThreadMessage,
};
use crate::assistant::error::AssistantError;
use crate::config::AssistantConfig;
use crate::db::{DBConnection, DBError};
use crate::models::assistant_turns::{
    AssistantTurn, NewAssistantTurn, SessionSummary, TurnRole, THREAD_MARKER_CONTENT,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub fn test_config() -> AssistantConfig {
    AssistantConfig {
        api_base: "http://localhost:0/v1".to_string(),
        api_key: "sk-test".to_string(),
        assistant_id: "asst_test".to_string(),
        summary_model: "test-model".to_string(),
        request_timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(1),
        poll_attempts: 5,
        always_fresh_thread: false,
    }
}

/// Bare turn template; `FakeDb::seed_turn` assigns id and timestamp.
pub fn turn(user_id: Uuid, session_id: &str, role: TurnRole, content: &str) -> AssistantTurn {
    AssistantTurn {
        id: 0,
        session_id: session_id.to_string(),
        user_id,
        thread_id: Some("thread-seeded".to_string()),
        role,
        content: content.to_string(),
        tokens_used: None,
        model: None,
        response_time_ms: None,
        session_title: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn marker_turn(user_id: Uuid, session_id: &str) -> AssistantTurn {
    turn(user_id, session_id, TurnRole::User, THREAD_MARKER_CONTENT)
}

/// In-memory `DBConnection` mirroring the Postgres query semantics.
pub struct FakeDb {
    turns: Mutex<Vec<AssistantTurn>>,
    next_id: AtomicI64,
    base_time: DateTime<Utc>,
}

impl FakeDb {
    pub fn new() -> Self {
        FakeDb {
            turns: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            base_time: Utc::now(),
        }
    }

    pub fn seed_turn(&self, template: AssistantTurn) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = template;
        stored.id = id;
        stored.created_at = self.base_time + ChronoDuration::milliseconds(id);
        self.turns.lock().unwrap().push(stored);
    }
}

impl DBConnection for FakeDb {
    fn insert_turn(&self, new_turn: NewAssistantTurn) -> Result<AssistantTurn, DBError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = AssistantTurn {
            id,
            session_id: new_turn.session_id,
            user_id: new_turn.user_id,
            thread_id: new_turn.thread_id,
            role: new_turn.role,
            content: new_turn.content,
            tokens_used: new_turn.tokens_used,
            model: new_turn.model,
            response_time_ms: new_turn.response_time_ms,
            session_title: new_turn.session_title,
            is_active: new_turn.is_active,
            created_at: self.base_time + ChronoDuration::milliseconds(id),
        };
        self.turns.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    fn get_session_turns(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<AssistantTurn>, DBError> {
        let mut turns: Vec<AssistantTurn> = self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.session_id == session_id && t.is_active)
            .cloned()
            .collect();
        turns.sort_by_key(|t| (t.created_at, t.id));
        Ok(turns)
    }

    fn get_session_turns_with_deleted(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<AssistantTurn>, DBError> {
        let mut turns: Vec<AssistantTurn> = self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.session_id == session_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| (t.created_at, t.id));
        Ok(turns)
    }

    fn find_thread_for_session(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Option<String>, DBError> {
        Ok(self
            .get_session_turns(user_id, session_id)?
            .into_iter()
            .find_map(|t| t.thread_id))
    }

    fn get_session_title(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Option<String>, DBError> {
        Ok(self
            .get_session_turns(user_id, session_id)?
            .into_iter()
            .find_map(|t| t.session_title))
    }

    fn set_session_title(
        &self,
        user_id: Uuid,
        session_id: &str,
        title: &str,
    ) -> Result<usize, DBError> {
        let mut turns = self.turns.lock().unwrap();
        let mut touched = 0;
        for t in turns.iter_mut() {
            if t.user_id == user_id && t.session_id == session_id {
                t.session_title = Some(title.to_string());
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn deactivate_session(&self, user_id: Uuid, session_id: &str) -> Result<usize, DBError> {
        let mut turns = self.turns.lock().unwrap();
        let mut touched = 0;
        for t in turns.iter_mut() {
            if t.user_id == user_id && t.session_id == session_id && t.is_active {
                t.is_active = false;
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn count_active_turns(&self, user_id: Uuid, session_id: &str) -> Result<i64, DBError> {
        Ok(self.get_session_turns(user_id, session_id)?.len() as i64)
    }

    fn list_session_summaries(&self, user_id: Uuid) -> Result<Vec<SessionSummary>, DBError> {
        let turns = self.turns.lock().unwrap();
        let mut summaries: Vec<SessionSummary> = Vec::new();
        for t in turns.iter() {
            if t.user_id != user_id || !t.is_active || t.content == THREAD_MARKER_CONTENT {
                continue;
            }
            match summaries
                .iter_mut()
                .find(|s| s.session_id == t.session_id)
            {
                Some(summary) => {
                    summary.turn_count += 1;
                    if summary.last_activity < Some(t.created_at) {
                        summary.last_activity = Some(t.created_at);
                    }
                    if summary.title.is_none() {
                        summary.title = t.session_title.clone();
                    }
                }
                None => summaries.push(SessionSummary {
                    session_id: t.session_id.clone(),
                    title: t.session_title.clone(),
                    last_activity: Some(t.created_at),
                    turn_count: 1,
                }),
            }
        }
        summaries.sort_by_key(|s| std::cmp::Reverse(s.last_activity));
        Ok(summaries)
    }
}

/// Scripted `AssistantApi` with per-call failure switches.
pub struct ScriptedAssistantApi {
    thread_counter: AtomicUsize,
    create_thread_fails: Mutex<bool>,
    add_message_fails: Mutex<bool>,
    run_statuses: Mutex<VecDeque<String>>,
    run_error_detail: Mutex<Option<String>>,
    failing_polls: AtomicUsize,
    poll_count: AtomicUsize,
    replies: Mutex<Vec<String>>,
    summary: Mutex<Option<String>>,
    summarize_fails: Mutex<bool>,
    summarize_count: AtomicUsize,
}

impl ScriptedAssistantApi {
    pub fn new() -> Self {
        ScriptedAssistantApi {
            thread_counter: AtomicUsize::new(1),
            create_thread_fails: Mutex::new(false),
            add_message_fails: Mutex::new(false),
            run_statuses: Mutex::new(VecDeque::new()),
            run_error_detail: Mutex::new(None),
            failing_polls: AtomicUsize::new(0),
            poll_count: AtomicUsize::new(0),
            replies: Mutex::new(vec!["scripted reply".to_string()]),
            summary: Mutex::new(None),
            summarize_fails: Mutex::new(false),
            summarize_count: AtomicUsize::new(0),
        }
    }

    pub fn fail_create_thread(&self) {
        *self.create_thread_fails.lock().unwrap() = true;
    }

    pub fn fail_add_message(&self) {
        *self.add_message_fails.lock().unwrap() = true;
    }

    /// Statuses returned by successive polls; the last one repeats forever.
    pub fn script_run_statuses(&self, statuses: &[&str]) {
        *self.run_statuses.lock().unwrap() =
            statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_run_error_detail(&self, detail: &str) {
        *self.run_error_detail.lock().unwrap() = Some(detail.to_string());
    }

    pub fn fail_next_polls(&self, count: usize) {
        self.failing_polls.store(count, Ordering::SeqCst);
    }

    pub fn run_polls(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn set_reply_text(&self, text: &str) {
        *self.replies.lock().unwrap() = vec![text.to_string()];
    }

    pub fn clear_replies(&self) {
        self.replies.lock().unwrap().clear();
    }

    pub fn set_summary(&self, summary: &str) {
        *self.summary.lock().unwrap() = Some(summary.to_string());
    }

    pub fn fail_summarize(&self) {
        *self.summarize_fails.lock().unwrap() = true;
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_count.load(Ordering::SeqCst)
    }

    fn next_status(&self) -> String {
        let mut statuses = self.run_statuses.lock().unwrap();
        match statuses.len() {
            0 => "completed".to_string(),
            1 => statuses.front().expect("non-empty").clone(),
            _ => statuses.pop_front().expect("non-empty"),
        }
    }

    fn service_error(&self) -> AssistantError {
        AssistantError::Api {
            status: 503,
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl AssistantApi for ScriptedAssistantApi {
    async fn create_thread(&self) -> Result<CreatedThread, AssistantError> {
        if *self.create_thread_fails.lock().unwrap() {
            return Err(self.service_error());
        }
        let n = self.thread_counter.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedThread {
            id: format!("thread-{}", n),
        })
    }

    async fn add_message(&self, _thread_id: &str, _content: &str) -> Result<(), AssistantError> {
        if *self.add_message_fails.lock().unwrap() {
            return Err(self.service_error());
        }
        Ok(())
    }

    async fn create_run(&self, _thread_id: &str) -> Result<RunObject, AssistantError> {
        Ok(RunObject {
            id: "run-1".to_string(),
            status: "queued".to_string(),
            model: Some("gpt-4o".to_string()),
            last_error: None,
            usage: None,
        })
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<RunObject, AssistantError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(self.service_error());
        }

        let status = self.next_status();
        let last_error = if status == "failed" {
            self.run_error_detail
                .lock()
                .unwrap()
                .clone()
                .map(|message| RunError {
                    message: Some(message),
                })
        } else {
            None
        };
        Ok(RunObject {
            id: run_id.to_string(),
            status,
            model: Some("gpt-4o".to_string()),
            last_error,
            usage: Some(RunUsage { total_tokens: 42 }),
        })
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError> {
        Ok(self
            .replies
            .lock()
            .unwrap()
            .iter()
            .map(|text| ThreadMessage {
                role: "assistant".to_string(),
                content: vec![MessageContentPart::Text {
                    text: MessageText {
                        value: text.clone(),
                    },
                }],
            })
            .collect())
    }

    async fn summarize(&self, _transcript: &str) -> Result<String, AssistantError> {
        self.summarize_count.fetch_add(1, Ordering::SeqCst);
        if *self.summarize_fails.lock().unwrap() {
            return Err(self.service_error());
        }
        Ok(self
            .summary
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "Scripted summary".to_string()))
    }
}

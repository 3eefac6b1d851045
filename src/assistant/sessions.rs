//! Per-user session listing, history and soft delete.

use super::error::AssistantError;
use crate::db::DBConnection;
use crate::models::assistant_turns::AssistantTurn;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_SESSION_TITLE: &str = "New Conversation";
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub session_id: String,
    pub title: String,
    pub last_message_time: Option<DateTime<Utc>>,
    pub message_count: i64,
    pub formatted_time: String,
}

pub struct SessionDirectory {
    db: Arc<dyn DBConnection + Send + Sync>,
}

impl SessionDirectory {
    pub fn new(db: Arc<dyn DBConnection + Send + Sync>) -> Self {
        SessionDirectory { db }
    }

    pub fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionOverview>, AssistantError> {
        let now = Utc::now();
        let summaries = self.db.list_session_summaries(user_id)?;
        Ok(summaries
            .into_iter()
            .map(|summary| SessionOverview {
                session_id: summary.session_id,
                title: summary
                    .title
                    .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_string()),
                last_message_time: summary.last_activity,
                message_count: summary.turn_count,
                formatted_time: summary
                    .last_activity
                    .map(|ts| format_relative_time(ts, now))
                    .unwrap_or_else(|| "Just now".to_string()),
            })
            .collect())
    }

    /// Visible turns of a session, oldest first. Returns None when no active
    /// turn exists for this user: non-existent and not-owned are deliberately
    /// indistinguishable to the caller.
    pub fn get_history(
        &self,
        user_id: Uuid,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Option<Vec<AssistantTurn>>, AssistantError> {
        if self.db.count_active_turns(user_id, session_id)? == 0 {
            return Ok(None);
        }

        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);
        let turns: Vec<AssistantTurn> = self
            .db
            .get_session_turns(user_id, session_id)?
            .into_iter()
            .filter(|turn| !turn.is_thread_marker())
            .collect();

        // Keep the most recent `limit` turns without disturbing order.
        let skip = turns.len().saturating_sub(limit);
        Ok(Some(turns.into_iter().skip(skip).collect()))
    }

    /// Soft delete. Returns false when zero rows matched, i.e. the session
    /// never existed for this user or was already deleted.
    pub fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<bool, AssistantError> {
        let touched = self.db.deactivate_session(user_id, session_id)?;
        debug!(
            "Soft-deleted session {} for user {}: {} rows",
            session_id, user_id, touched
        );
        Ok(touched > 0)
    }
}

/// Relative-time label for the session list. Anything anomalous (future
/// timestamps included) degrades to "Just now" rather than an error.
pub fn format_relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(ts);
    if elapsed.num_seconds() < 0 {
        return "Just now".to_string();
    }
    let hours = elapsed.num_hours();
    if hours < 1 {
        return "Just now".to_string();
    }
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    let days = elapsed.num_days();
    if days <= 7 {
        return format!("{}d ago", days);
    }
    ts.format("%b %-d, %Y").to_string()
}

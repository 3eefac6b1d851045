use crate::models::schema::assistant_turns;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, max};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Content of the synthetic turn that pins a session to its remote thread.
/// Never shown to users; filtered out of history and session aggregates.
pub const THREAD_MARKER_CONTENT: &str = "__thread_created__";

#[derive(Error, Debug)]
pub enum AssistantTurnError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[ExistingTypePath = "crate::models::schema::sql_types::TurnRole"]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = assistant_turns)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AssistantTurn {
    pub id: i64,
    pub session_id: String,
    pub user_id: Uuid,
    pub thread_id: Option<String>,
    pub role: TurnRole,
    pub content: String,
    pub tokens_used: Option<i32>,
    pub model: Option<String>,
    pub response_time_ms: Option<i32>,
    pub session_title: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AssistantTurn {
    pub fn is_thread_marker(&self) -> bool {
        self.content == THREAD_MARKER_CONTENT
    }

    /// Active turns of a session in conversation order, marker turns included.
    pub fn list_for_session(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
        lookup_session_id: &str,
    ) -> Result<Vec<AssistantTurn>, AssistantTurnError> {
        assistant_turns::table
            .filter(assistant_turns::user_id.eq(lookup_user_id))
            .filter(assistant_turns::session_id.eq(lookup_session_id))
            .filter(assistant_turns::is_active.eq(true))
            .order((assistant_turns::created_at.asc(), assistant_turns::id.asc()))
            .load::<AssistantTurn>(conn)
            .map_err(AssistantTurnError::DatabaseError)
    }

    /// Every turn of a session regardless of `is_active`. Audit use only.
    pub fn list_all_for_session(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
        lookup_session_id: &str,
    ) -> Result<Vec<AssistantTurn>, AssistantTurnError> {
        assistant_turns::table
            .filter(assistant_turns::user_id.eq(lookup_user_id))
            .filter(assistant_turns::session_id.eq(lookup_session_id))
            .order((assistant_turns::created_at.asc(), assistant_turns::id.asc()))
            .load::<AssistantTurn>(conn)
            .map_err(AssistantTurnError::DatabaseError)
    }

    pub fn find_thread_id(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
        lookup_session_id: &str,
    ) -> Result<Option<String>, AssistantTurnError> {
        assistant_turns::table
            .filter(assistant_turns::user_id.eq(lookup_user_id))
            .filter(assistant_turns::session_id.eq(lookup_session_id))
            .filter(assistant_turns::is_active.eq(true))
            .filter(assistant_turns::thread_id.is_not_null())
            .order((assistant_turns::created_at.asc(), assistant_turns::id.asc()))
            .select(assistant_turns::thread_id)
            .first::<Option<String>>(conn)
            .optional()
            .map(|row| row.flatten())
            .map_err(AssistantTurnError::DatabaseError)
    }

    pub fn get_session_title(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
        lookup_session_id: &str,
    ) -> Result<Option<String>, AssistantTurnError> {
        assistant_turns::table
            .filter(assistant_turns::user_id.eq(lookup_user_id))
            .filter(assistant_turns::session_id.eq(lookup_session_id))
            .filter(assistant_turns::is_active.eq(true))
            .filter(assistant_turns::session_title.is_not_null())
            .order((assistant_turns::created_at.asc(), assistant_turns::id.asc()))
            .select(assistant_turns::session_title)
            .first::<Option<String>>(conn)
            .optional()
            .map(|row| row.flatten())
            .map_err(AssistantTurnError::DatabaseError)
    }

    /// Denormalized title assignment: one UPDATE across every turn of the
    /// session so the listing aggregate sees it regardless of which turn wins
    /// the MAX.
    pub fn assign_title(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
        lookup_session_id: &str,
        title: &str,
    ) -> Result<usize, AssistantTurnError> {
        diesel::update(
            assistant_turns::table
                .filter(assistant_turns::user_id.eq(lookup_user_id))
                .filter(assistant_turns::session_id.eq(lookup_session_id)),
        )
        .set(assistant_turns::session_title.eq(title))
        .execute(conn)
        .map_err(AssistantTurnError::DatabaseError)
    }

    /// Soft delete: flips `is_active` on all active turns of the session in a
    /// single statement. Returns the number of rows touched.
    pub fn deactivate_session(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
        lookup_session_id: &str,
    ) -> Result<usize, AssistantTurnError> {
        diesel::update(
            assistant_turns::table
                .filter(assistant_turns::user_id.eq(lookup_user_id))
                .filter(assistant_turns::session_id.eq(lookup_session_id))
                .filter(assistant_turns::is_active.eq(true)),
        )
        .set(assistant_turns::is_active.eq(false))
        .execute(conn)
        .map_err(AssistantTurnError::DatabaseError)
    }

    pub fn count_active(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
        lookup_session_id: &str,
    ) -> Result<i64, AssistantTurnError> {
        assistant_turns::table
            .filter(assistant_turns::user_id.eq(lookup_user_id))
            .filter(assistant_turns::session_id.eq(lookup_session_id))
            .filter(assistant_turns::is_active.eq(true))
            .count()
            .get_result(conn)
            .map_err(AssistantTurnError::DatabaseError)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = assistant_turns)]
pub struct NewAssistantTurn {
    pub session_id: String,
    pub user_id: Uuid,
    pub thread_id: Option<String>,
    pub role: TurnRole,
    pub content: String,
    pub tokens_used: Option<i32>,
    pub model: Option<String>,
    pub response_time_ms: Option<i32>,
    pub session_title: Option<String>,
    pub is_active: bool,
}

impl NewAssistantTurn {
    pub fn user(
        user_id: Uuid,
        session_id: &str,
        thread_id: &str,
        content: &str,
        session_title: Option<&str>,
    ) -> Self {
        NewAssistantTurn {
            session_id: session_id.to_string(),
            user_id,
            thread_id: Some(thread_id.to_string()),
            role: TurnRole::User,
            content: content.to_string(),
            tokens_used: None,
            model: None,
            response_time_ms: None,
            session_title: session_title.map(|t| t.to_string()),
            is_active: true,
        }
    }

    pub fn assistant(
        user_id: Uuid,
        session_id: &str,
        thread_id: &str,
        content: &str,
        tokens_used: i32,
        model: &str,
        response_time_ms: i32,
        session_title: Option<&str>,
    ) -> Self {
        NewAssistantTurn {
            session_id: session_id.to_string(),
            user_id,
            thread_id: Some(thread_id.to_string()),
            role: TurnRole::Assistant,
            content: content.to_string(),
            tokens_used: Some(tokens_used),
            model: Some(model.to_string()),
            response_time_ms: Some(response_time_ms),
            session_title: session_title.map(|t| t.to_string()),
            is_active: true,
        }
    }

    /// The synthetic turn that persists the session-to-thread mapping across
    /// process restarts without a separate table.
    pub fn thread_marker(user_id: Uuid, session_id: &str, thread_id: &str) -> Self {
        NewAssistantTurn {
            session_id: session_id.to_string(),
            user_id,
            thread_id: Some(thread_id.to_string()),
            role: TurnRole::User,
            content: THREAD_MARKER_CONTENT.to_string(),
            tokens_used: None,
            model: None,
            response_time_ms: None,
            session_title: None,
            is_active: true,
        }
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<AssistantTurn, AssistantTurnError> {
        diesel::insert_into(assistant_turns::table)
            .values(self)
            .get_result::<AssistantTurn>(conn)
            .map_err(AssistantTurnError::DatabaseError)
    }
}

/// Derived per-session aggregate used by the session listing. Sessions are
/// not a stored entity; this is GROUP BY over active non-marker turns.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub turn_count: i64,
}

impl SessionSummary {
    pub fn list_for_user(
        conn: &mut PgConnection,
        lookup_user_id: Uuid,
    ) -> Result<Vec<SessionSummary>, AssistantTurnError> {
        assistant_turns::table
            .filter(assistant_turns::user_id.eq(lookup_user_id))
            .filter(assistant_turns::is_active.eq(true))
            .filter(assistant_turns::content.ne(THREAD_MARKER_CONTENT))
            .group_by(assistant_turns::session_id)
            .select((
                assistant_turns::session_id,
                max(assistant_turns::session_title),
                max(assistant_turns::created_at),
                count_star(),
            ))
            .order(max(assistant_turns::created_at).desc())
            .load::<(String, Option<String>, Option<DateTime<Utc>>, i64)>(conn)
            .map(|rows| {
                rows.into_iter()
                    .map(|(session_id, title, last_activity, turn_count)| SessionSummary {
                        session_id,
                        title,
                        last_activity,
                        turn_count,
                    })
                    .collect()
            })
            .map_err(AssistantTurnError::DatabaseError)
    }
}

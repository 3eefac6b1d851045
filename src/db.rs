use crate::models::assistant_turns::{
    AssistantTurn, AssistantTurnError, NewAssistantTurn, SessionSummary,
};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DBError {
    #[error("Connection pool error: {0}")]
    PoolError(String),
    #[error(transparent)]
    TurnError(#[from] AssistantTurnError),
}

type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Store access for the assistant orchestrator. Held as a trait object so
/// tests can substitute an in-memory implementation.
pub trait DBConnection: Send + Sync {
    fn insert_turn(&self, new_turn: NewAssistantTurn) -> Result<AssistantTurn, DBError>;

    /// Active turns of a session in conversation order, markers included.
    fn get_session_turns(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<AssistantTurn>, DBError>;

    /// Every turn of a session, soft-deleted rows included. Audit use only.
    fn get_session_turns_with_deleted(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<AssistantTurn>, DBError>;

    fn find_thread_for_session(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Option<String>, DBError>;

    fn get_session_title(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Option<String>, DBError>;

    /// Bulk title assignment across all turns of the session. Returns rows touched.
    fn set_session_title(
        &self,
        user_id: Uuid,
        session_id: &str,
        title: &str,
    ) -> Result<usize, DBError>;

    /// Bulk soft delete. Returns rows touched; zero means the session never
    /// existed for this user or was already deleted.
    fn deactivate_session(&self, user_id: Uuid, session_id: &str) -> Result<usize, DBError>;

    fn count_active_turns(&self, user_id: Uuid, session_id: &str) -> Result<i64, DBError>;

    fn list_session_summaries(&self, user_id: Uuid) -> Result<Vec<SessionSummary>, DBError>;
}

pub struct PostgresConnection {
    pool: PgPool,
}

impl PostgresConnection {
    fn conn(&self) -> Result<PgPooledConnection, DBError> {
        self.pool
            .get()
            .map_err(|e| DBError::PoolError(e.to_string()))
    }
}

impl DBConnection for PostgresConnection {
    fn insert_turn(&self, new_turn: NewAssistantTurn) -> Result<AssistantTurn, DBError> {
        let mut conn = self.conn()?;
        Ok(new_turn.insert(&mut conn)?)
    }

    fn get_session_turns(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<AssistantTurn>, DBError> {
        let mut conn = self.conn()?;
        Ok(AssistantTurn::list_for_session(&mut conn, user_id, session_id)?)
    }

    fn get_session_turns_with_deleted(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Vec<AssistantTurn>, DBError> {
        let mut conn = self.conn()?;
        Ok(AssistantTurn::list_all_for_session(&mut conn, user_id, session_id)?)
    }

    fn find_thread_for_session(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Option<String>, DBError> {
        let mut conn = self.conn()?;
        Ok(AssistantTurn::find_thread_id(&mut conn, user_id, session_id)?)
    }

    fn get_session_title(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<Option<String>, DBError> {
        let mut conn = self.conn()?;
        Ok(AssistantTurn::get_session_title(&mut conn, user_id, session_id)?)
    }

    fn set_session_title(
        &self,
        user_id: Uuid,
        session_id: &str,
        title: &str,
    ) -> Result<usize, DBError> {
        let mut conn = self.conn()?;
        Ok(AssistantTurn::assign_title(&mut conn, user_id, session_id, title)?)
    }

    fn deactivate_session(&self, user_id: Uuid, session_id: &str) -> Result<usize, DBError> {
        let mut conn = self.conn()?;
        Ok(AssistantTurn::deactivate_session(&mut conn, user_id, session_id)?)
    }

    fn count_active_turns(&self, user_id: Uuid, session_id: &str) -> Result<i64, DBError> {
        let mut conn = self.conn()?;
        Ok(AssistantTurn::count_active(&mut conn, user_id, session_id)?)
    }

    fn list_session_summaries(&self, user_id: Uuid) -> Result<Vec<SessionSummary>, DBError> {
        let mut conn = self.conn()?;
        Ok(SessionSummary::list_for_user(&mut conn, user_id)?)
    }
}

pub fn setup_db(database_url: &str) -> Result<PostgresConnection, DBError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| DBError::PoolError(e.to_string()))?;
    info!("Database connection pool established");
    Ok(PostgresConnection { pool })
}

//! Session-to-thread mapping. The mapping is persisted as a marker turn so it
//! survives restarts without a separate table; the get-or-create step is
//! serialized per session so two concurrent first messages cannot each create
//! a thread.

use super::api::AssistantApi;
use super::error::AssistantError;
use crate::db::DBConnection;
use crate::models::assistant_turns::NewAssistantTurn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error};
use uuid::Uuid;

/// Short-lived async mutexes keyed by session id. Entries are created on
/// demand and live for the process lifetime; the per-session cost is one Arc.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn acquire(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("session lock map poisoned");
        map.entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

pub struct ThreadRegistry {
    db: Arc<dyn DBConnection + Send + Sync>,
    api: Arc<dyn AssistantApi>,
    always_fresh: bool,
    locks: SessionLocks,
}

impl ThreadRegistry {
    pub fn new(
        db: Arc<dyn DBConnection + Send + Sync>,
        api: Arc<dyn AssistantApi>,
        always_fresh: bool,
    ) -> Self {
        ThreadRegistry {
            db,
            api,
            always_fresh,
            locks: SessionLocks::default(),
        }
    }

    /// Resolve the remote thread for a session.
    ///
    /// Under the always-fresh policy the lookup is skipped and every call
    /// creates a new remote thread; otherwise an existing mapping is reused
    /// and a session keeps one thread for its active lifetime.
    pub async fn get_or_create(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<String, AssistantError> {
        let lock = self.locks.acquire(session_id);
        let _guard = lock.lock().await;

        if !self.always_fresh {
            if let Some(existing) = self.db.find_thread_for_session(user_id, session_id)? {
                debug!("Reusing thread {} for session {}", existing, session_id);
                return Ok(existing);
            }
        }

        let thread = self.api.create_thread().await.map_err(|e| {
            error!("Thread creation failed for session {}: {}", session_id, e);
            AssistantError::ThreadCreation(e.to_string())
        })?;

        // The marker turn is what makes the mapping durable; persist it before
        // releasing the lock so a concurrent caller sees it.
        self.db
            .insert_turn(NewAssistantTurn::thread_marker(user_id, session_id, &thread.id))?;

        debug!("Created thread {} for session {}", thread.id, session_id);
        Ok(thread.id)
    }
}

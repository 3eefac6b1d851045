//! Best-effort session titling. The remote summarization call may fail for
//! any reason; the fallback heuristic never does.

use super::api::AssistantApi;
use super::error::AssistantError;
use crate::db::DBConnection;
use crate::models::assistant_turns::{AssistantTurn, TurnRole};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 50;
const TRANSCRIPT_TURNS: usize = 5;

pub struct TitleGenerator {
    db: Arc<dyn DBConnection + Send + Sync>,
    api: Arc<dyn AssistantApi>,
}

impl TitleGenerator {
    pub fn new(db: Arc<dyn DBConnection + Send + Sync>, api: Arc<dyn AssistantApi>) -> Self {
        TitleGenerator { db, api }
    }

    /// Derive and persist a short label for the session. Idempotent: a
    /// session that already has a title is left untouched. A session with no
    /// visible turns (or one not owned by this user) is a silent no-op.
    pub async fn generate(&self, user_id: Uuid, session_id: &str) -> Result<(), AssistantError> {
        if self.db.get_session_title(user_id, session_id)?.is_some() {
            debug!("Session {} already titled, skipping", session_id);
            return Ok(());
        }

        let turns: Vec<AssistantTurn> = self
            .db
            .get_session_turns(user_id, session_id)?
            .into_iter()
            .filter(|turn| !turn.is_thread_marker())
            .collect();
        if turns.is_empty() {
            return Ok(());
        }

        let transcript = build_transcript(&turns);
        let title = match self.api.summarize(&transcript).await {
            Ok(raw) => sanitize_title(&raw),
            Err(e) => {
                warn!(
                    "Summarization failed for session {}, using fallback: {}",
                    session_id, e
                );
                None
            }
        };

        let Some(title) = title.or_else(|| fallback_title(&turns)) else {
            // No usable source at all; leave the title null and let the
            // directory show its placeholder.
            return Ok(());
        };

        let updated = self.db.set_session_title(user_id, session_id, &title)?;
        debug!(
            "Titled session {} as {:?} across {} turns",
            session_id, title, updated
        );
        Ok(())
    }
}

fn build_transcript(turns: &[AssistantTurn]) -> String {
    turns
        .iter()
        .take(TRANSCRIPT_TURNS)
        .map(|turn| {
            let speaker = match turn.role {
                TurnRole::User => "User",
                TurnRole::Assistant => "Assistant",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip quotes, collapse whitespace, bound the length. Returns None when
/// nothing usable remains.
fn sanitize_title(raw: &str) -> Option<String> {
    let cleaned = raw.replace(['"', '\'', '\u{201c}', '\u{201d}'], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Some(truncate_chars(cleaned, TITLE_MAX_CHARS))
}

/// First user turn, truncated with an ellipsis. Returns None only when the
/// session holds no user turn at all.
fn fallback_title(turns: &[AssistantTurn]) -> Option<String> {
    let first_user = turns.iter().find(|turn| turn.role == TurnRole::User)?;
    let content = first_user.content.trim();
    if content.is_empty() {
        return None;
    }
    if content.chars().count() <= TITLE_MAX_CHARS {
        Some(content.to_string())
    } else {
        Some(format!("{}...", truncate_chars(content, TITLE_MAX_CHARS - 3)))
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{turn, FakeDb, ScriptedAssistantApi};

    fn generator() -> (Arc<FakeDb>, Arc<ScriptedAssistantApi>, TitleGenerator) {
        let db = Arc::new(FakeDb::new());
        let api = Arc::new(ScriptedAssistantApi::new());
        let generator = TitleGenerator::new(db.clone(), api.clone());
        (db, api, generator)
    }

    #[tokio::test]
    async fn test_title_from_summarization() {
        let (db, api, generator) = generator();
        api.set_summary("Printer toner request");
        let user = Uuid::new_v4();
        db.seed_turn(turn(user, "s1", TurnRole::User, "Where do I get toner?"));

        generator.generate(user, "s1").await.unwrap();

        assert_eq!(
            db.get_session_title(user, "s1").unwrap().as_deref(),
            Some("Printer toner request")
        );
    }

    #[tokio::test]
    async fn test_generate_is_idempotent() {
        let (db, api, generator) = generator();
        api.set_summary("First title");
        let user = Uuid::new_v4();
        db.seed_turn(turn(user, "s1", TurnRole::User, "hello"));

        generator.generate(user, "s1").await.unwrap();
        api.set_summary("Second title");
        generator.generate(user, "s1").await.unwrap();

        assert_eq!(
            db.get_session_title(user, "s1").unwrap().as_deref(),
            Some("First title")
        );
        assert_eq!(api.summarize_calls(), 1, "second call must be a no-op");
    }

    #[tokio::test]
    async fn test_fallback_when_summarization_fails() {
        let (db, api, generator) = generator();
        api.fail_summarize();
        let user = Uuid::new_v4();
        db.seed_turn(turn(user, "s1", TurnRole::User, "Where is the badge office?"));

        generator.generate(user, "s1").await.unwrap();

        assert_eq!(
            db.get_session_title(user, "s1").unwrap().as_deref(),
            Some("Where is the badge office?")
        );
    }

    #[tokio::test]
    async fn test_fallback_truncates_long_first_message() {
        let (db, api, generator) = generator();
        api.fail_summarize();
        let user = Uuid::new_v4();
        let long = "a".repeat(80);
        db.seed_turn(turn(user, "s1", TurnRole::User, &long));

        generator.generate(user, "s1").await.unwrap();

        let title = db.get_session_title(user, "s1").unwrap().unwrap();
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn test_empty_session_stays_untitled() {
        let (db, api, generator) = generator();
        api.fail_summarize();
        let user = Uuid::new_v4();

        generator.generate(user, "missing").await.unwrap();

        assert!(db.get_session_title(user, "missing").unwrap().is_none());
    }

    #[test]
    fn test_sanitize_strips_quotes() {
        assert_eq!(
            sanitize_title("\"Office move questions\"").as_deref(),
            Some("Office move questions")
        );
        assert_eq!(
            sanitize_title("\u{201c}Laptop swap\u{201d}").as_deref(),
            Some("Laptop swap")
        );
    }

    #[test]
    fn test_sanitize_rejects_empty() {
        assert!(sanitize_title("  \"\"  ").is_none());
    }

    #[test]
    fn test_sanitize_bounds_length() {
        let raw = "x".repeat(120);
        assert_eq!(sanitize_title(&raw).unwrap().chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn test_transcript_caps_turn_count() {
        let user = Uuid::new_v4();
        let turns: Vec<AssistantTurn> = (0..8)
            .map(|i| turn(user, "s1", TurnRole::User, &format!("message {}", i)))
            .collect();
        let transcript = build_transcript(&turns);
        assert_eq!(transcript.lines().count(), TRANSCRIPT_TURNS);
    }
}

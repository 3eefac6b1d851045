//! Assistant configuration, read once at startup and injected through AppState.

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Everything the orchestrator needs to talk to the remote assistant service.
///
/// Poll parameters default to the production 60 x 1s budget; tests drive the
/// run state machine in milliseconds by overriding them.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_base: String,
    pub api_key: String,
    pub assistant_id: String,
    pub summary_model: String,
    /// Per-call network timeout, kept well under the overall poll budget so a
    /// single stalled call cannot hang a request indefinitely.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    /// When true a new remote thread is created for every turn instead of
    /// reusing the session's existing one. Remote conversational memory is
    /// discarded, but local and remote context can never silently diverge.
    pub always_fresh_thread: bool,
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Env access is injected so parsing can be tested without touching
    /// process-global state.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => Err(ConfigError::MissingVar(name)),
            }
        };

        let api_key = required("OPENAI_API_KEY")?;
        let assistant_id = required("OPENAI_ASSISTANT_ID")?;

        let api_base = lookup("OPENAI_API_BASE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let summary_model = lookup("ASSISTANT_SUMMARY_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        let request_timeout_secs =
            parse_or(&lookup, "ASSISTANT_REQUEST_TIMEOUT_SECS", 30u64)?;
        let poll_interval_ms = parse_or(&lookup, "ASSISTANT_POLL_INTERVAL_MS", 1000u64)?;
        let poll_attempts = parse_or(&lookup, "ASSISTANT_POLL_ATTEMPTS", 60u32)?;
        let always_fresh_thread = parse_or(&lookup, "ASSISTANT_ALWAYS_FRESH_THREAD", true)?;

        Ok(AssistantConfig {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            assistant_id,
            summary_model,
            request_timeout: Duration::from_secs(request_timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
            poll_attempts,
            always_fresh_thread,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidVar(name, raw)),
        _ => Ok(default),
    }
}

//! Run execution: start a run against a thread and poll it to a terminal
//! state. Polling is the only completion signal the remote service offers.

use super::api::{AssistantApi, RunObject, RunStatus};
use super::error::AssistantError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub struct RunExecutor {
    api: Arc<dyn AssistantApi>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl RunExecutor {
    pub fn new(api: Arc<dyn AssistantApi>, poll_interval: Duration, poll_attempts: u32) -> Self {
        RunExecutor {
            api,
            poll_interval,
            poll_attempts,
        }
    }

    /// Start a run and poll until it leaves the active states or the attempt
    /// budget is spent.
    ///
    /// A poll error is treated as "status not yet known": it is logged and
    /// consumes a regular attempt slot, so persistent flakiness surfaces as
    /// the same timeout as genuine slowness. Nothing here retries the run
    /// itself; remote runs are not idempotent to blind local retry.
    pub async fn start_and_poll(&self, thread_id: &str) -> Result<RunObject, AssistantError> {
        let run = self.api.create_run(thread_id).await?;
        debug!("Started run {} on thread {}", run.id, thread_id);
        let run_id = run.id.clone();

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for attempt in 1..=self.poll_attempts {
            ticker.tick().await;

            let polled = match self.api.get_run(thread_id, &run_id).await {
                Ok(polled) => polled,
                Err(e) => {
                    warn!(
                        "Run {} poll attempt {}/{} failed: {}",
                        run_id, attempt, self.poll_attempts, e
                    );
                    continue;
                }
            };

            let status = RunStatus::parse(&polled.status);
            if status.is_active() {
                continue;
            }

            return match status {
                RunStatus::Completed => Ok(polled),
                RunStatus::Failed => {
                    let detail = polled
                        .error_detail()
                        .unwrap_or_else(|| "no detail provided".to_string());
                    Err(AssistantError::RunFailed(detail))
                }
                _ => Err(AssistantError::RunEnded(polled.status)),
            };
        }

        warn!(
            "Run {} on thread {} still active after {} attempts",
            run_id, thread_id, self.poll_attempts
        );
        Err(AssistantError::RunTimeout)
    }
}

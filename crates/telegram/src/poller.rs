use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::{TelegramApi, Update};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl PollPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: Update);
}

/// Long-poll loop over `getUpdates`. Each received update is handled on its
/// own task so one user's slow portal round-trip never stalls another user's
/// commands; consecutive transport failures back off and eventually stop the
/// runner without crashing the process.
pub struct UpdatePoller {
    api: Arc<dyn TelegramApi>,
    handler: Arc<dyn UpdateHandler>,
    policy: PollPolicy,
    poll_timeout_secs: u64,
    label: String,
}

impl UpdatePoller {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        handler: Arc<dyn UpdateHandler>,
        policy: PollPolicy,
        poll_timeout_secs: u64,
        label: impl Into<String>,
    ) -> Self {
        Self { api, handler, policy, poll_timeout_secs, label: label.into() }
    }

    pub async fn run(&self) -> Result<()> {
        let mut offset: Option<i64> = None;
        let mut consecutive_failures: u32 = 0;

        info!(bot = %self.label, "update poller started");

        loop {
            match self.api.get_updates(offset, self.poll_timeout_secs).await {
                Ok(updates) => {
                    consecutive_failures = 0;
                    for update in updates {
                        offset = Some(offset.unwrap_or(0).max(update.update_id + 1));
                        debug!(
                            bot = %self.label,
                            update_id = update.update_id,
                            "dispatching update"
                        );

                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            handler.handle(update).await;
                        });
                    }
                }
                Err(error) => {
                    warn!(
                        bot = %self.label,
                        attempt = consecutive_failures,
                        max_retries = self.policy.max_retries,
                        error = %error,
                        "getUpdates poll failed"
                    );

                    if consecutive_failures >= self.policy.max_retries {
                        warn!(
                            bot = %self.label,
                            max_retries = self.policy.max_retries,
                            "poll retries exhausted; stopping runner without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.policy.backoff(consecutive_failures);
                    consecutive_failures += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

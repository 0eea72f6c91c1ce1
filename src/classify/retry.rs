//! Bounded waits and backoff around model calls.

use std::time::Duration;

use crate::config::ModelSettings;
use crate::error::ModelCallError;

use super::client::{ModelClient, ModelRequest};

/// Timeout and retry budget for one logical model call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Limit on each attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&ModelSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            timeout: settings.request_timeout(),
        }
    }

    /// Delay before retry number `attempt` (0-based): doubles each time,
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Call the model, retrying timeouts, rate limits and transient failures.
///
/// A server retry hint takes the place of the computed backoff, still
/// capped at `max_backoff`. Non-retryable failures return at once.
pub async fn call_with_retry<C>(
    client: &C,
    request: &ModelRequest,
    policy: &RetryPolicy,
) -> Result<String, ModelCallError>
where
    C: ModelClient + ?Sized,
{
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, client.complete(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ModelCallError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = e
                    .retry_after()
                    .unwrap_or_else(|| policy.backoff(attempt))
                    .min(policy.max_backoff);
                log::warn!(
                    "Model call failed ({}), retry {}/{} in {:?}",
                    e,
                    attempt + 1,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                log::error!("Model call failed after {} attempts: {}", attempt + 1, e);
                return Err(e);
            }
        }
    }
}

use std::future::Future;

use crate::cycling::config::RetryPolicy;
use crate::error::{Error, GatewayError, Result};

/// Re-runs a gateway call on transient failure with a fixed delay.
///
/// Only wrap calls that are safe to repeat. Permanent failures (malformed
/// output) are returned on the first attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> RetryExecutor {
        RetryExecutor { policy }
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, GatewayError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("'{}' succeeded on attempt {}/{}.", operation, attempt, max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    return Err(Error::Gateway { operation: operation.to_string(), source: e });
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(operation, attempt, "'{}' failed on final attempt {}/{}: {}", operation, attempt, max_attempts, e);
                    return Err(Error::RetriesExhausted { operation: operation.to_string(), attempts: attempt, last: e });
                }
                Err(e) => {
                    tracing::warn!(operation, attempt, "'{}' failed (attempt {}/{}), retrying in {:?}: {}", operation, attempt, max_attempts, self.policy.delay, e);
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }
}

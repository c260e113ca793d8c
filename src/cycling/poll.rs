use std::future::Future;

use tokio::time::Instant;

use crate::cycling::config::PollPolicy;
use crate::error::{Error, Result};

/// Observes the cluster every `policy.interval` until `observe` yields a value.
///
/// Errors from `observe` end the wait immediately. With a deadline, the wait
/// fails with `ConvergenceTimeout` once the deadline has passed.
pub async fn wait_until<T, F, Fut>(policy: &PollPolicy, condition: &str, mut observe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut polls: u64 = 0;

    loop {
        polls += 1;
        if let Some(value) = observe().await? {
            log::debug!("{} after {} poll(s).", condition, polls);
            return Ok(value);
        }

        if let Some(deadline) = policy.deadline {
            let waited = started.elapsed();
            if waited >= deadline {
                return Err(Error::ConvergenceTimeout { condition: condition.to_string(), waited_secs: waited.as_secs() });
            }
        }

        log::info!("Still waiting for {} (poll {}), next check in {:?}.", condition, polls, policy.interval);
        tokio::time::sleep(policy.interval).await;
    }
}

use std::time::Duration;

use crate::api::config_dto::CyclerConfigDto;
use crate::domain::node::LabelKeys;
use crate::domain::zone_distribution::REQUIRED_ZONES;
use crate::error::{Error, Result};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 12;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(8);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(32);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Bounded-attempt, fixed-delay retry. No backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: DEFAULT_RETRY_ATTEMPTS, delay: DEFAULT_RETRY_DELAY }
    }
}

/// How convergence waits observe the cluster. Without a deadline a wait blocks
/// until the condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy { interval: DEFAULT_POLL_INTERVAL, deadline: None }
    }
}

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub drain_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub convergence_timeout_secs: Option<u64>,
}

/// Everything one invocation needs, resolved once and passed by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub context: String,
    pub project: String,
    pub drain_timeout: Duration,
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
    pub labels: LabelKeys,
    pub required_zones: usize,
}

impl RunConfig {
    pub fn new(context: impl Into<String>, project: impl Into<String>) -> RunConfig {
        RunConfig {
            context: context.into(),
            project: project.into(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
            labels: LabelKeys::default(),
            required_zones: REQUIRED_ZONES,
        }
    }

    /// Defaults, then the configuration file, then command-line overrides.
    pub fn from_sources(context: String, project: String, file: &CyclerConfigDto, overrides: &ConfigOverrides) -> Result<RunConfig> {
        let mut config = RunConfig::new(context, project);

        if let Some(secs) = overrides.drain_timeout_secs.or(file.drain_timeout_secs) {
            config.drain_timeout = Duration::from_secs(secs);
        }

        if let Some(retry) = &file.retry {
            if let Some(attempts) = retry.max_attempts {
                config.retry.max_attempts = attempts;
            }
            if let Some(secs) = retry.delay_secs {
                config.retry.delay = Duration::from_secs(secs);
            }
        }

        let file_poll = file.poll.clone().unwrap_or_default();
        if let Some(secs) = overrides.poll_interval_secs.or(file_poll.interval_secs) {
            config.poll.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.convergence_timeout_secs.or(file_poll.deadline_secs) {
            config.poll.deadline = Some(Duration::from_secs(secs));
        }

        if let Some(labels) = &file.labels {
            let keys = &mut config.labels;
            for (slot, value) in [(&mut keys.role, &labels.role), (&mut keys.retiring, &labels.retiring), (&mut keys.zone, &labels.zone), (&mut keys.region, &labels.region)] {
                if let Some(value) = value {
                    *slot = value.clone();
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.maxAttempts must be at least 1".to_string()));
        }
        if self.drain_timeout.is_zero() {
            return Err(Error::Config("drain timeout must be positive".to_string()));
        }
        if self.poll.interval.is_zero() && self.poll.deadline.is_none() {
            log::warn!("Polling with a zero interval and no deadline will spin until the cluster converges.");
        }
        let keys = &self.labels;
        if [&keys.role, &keys.retiring, &keys.zone, &keys.region].iter().any(|k| k.is_empty()) || keys.role == keys.retiring {
            return Err(Error::Config(format!("invalid label keys {:?}", keys)));
        }
        Ok(())
    }
}


use std::time::Duration;

use rand::Rng;

/// Retry timing policy. Calling [`BackoffPolicy::backoff`] mints a fresh
/// state machine, one per retryable operation.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Randomization factor in `[0, 1]`; each delay is scaled by a uniform
    /// sample from `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
    /// Retries allowed before the operation gives up.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.5,
            max_retries: 5,
        }
    }
}

impl BackoffPolicy {
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            policy: self.clone(),
            attempt: 0,
        }
    }
}

/// Exponential backoff with jitter. `next_delay` returns `None` once the
/// policy's retry budget is spent.
#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_retries {
            return None;
        }

        let cap = self.policy.max_delay.as_secs_f64();
        let base = self.policy.initial_delay.as_secs_f64()
            * self.policy.multiplier.powi(self.attempt as i32);
        let mut delay = base.min(cap);

        if self.policy.jitter > 0.0 {
            let spread = rand::thread_rng().gen_range(-self.policy.jitter..=self.policy.jitter);
            delay = (delay * (1.0 + spread)).clamp(0.0, cap);
        }

        self.attempt += 1;
        Some(Duration::from_secs_f64(delay))
    }

    /// Attempts handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

// SPDX-License-Identifier: GPL-3.0-only
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::SyncError;

/// Largest exponent used when doubling the base delay
const MAX_BACKOFF_EXPONENT: u32 = 32;

/// Bounded retry with capped exponential backoff and proportional jitter.
///
/// The delay after failed attempt `a` (zero-based) is
/// `min(max_delay, base * 2^a + jitter * base * 2^a)` with `jitter` drawn
/// uniformly from `[jitter_min, jitter_max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 behaves like 1
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl RetryPolicy {
    pub fn save() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_min: 0.0,
            jitter_max: 0.3,
        }
    }

    pub fn fetch() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
            jitter_min: 0.0,
            jitter_max: 0.3,
        }
    }

    pub fn auth() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
            jitter_min: 0.0,
            jitter_max: 0.1,
        }
    }

    /// A single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_min: 0.0,
            jitter_max: 0.0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay for a given jitter factor; deterministic.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exponential =
            self.base_delay_ms as f64 * 2f64.powi(attempt.min(MAX_BACKOFF_EXPONENT) as i32);
        let raw = exponential + jitter * exponential;
        let capped = if raw.is_finite() {
            raw.clamp(0.0, self.max_delay_ms as f64)
        } else {
            self.max_delay_ms as f64
        };
        Duration::from_millis(capped as u64)
    }

    /// Delay after failed attempt `attempt`, with jitter sampled from the policy's range.
    pub fn delay(&self, attempt: u32) -> Duration {
        let bounded = self.jitter_min.is_finite() && self.jitter_max.is_finite();
        let jitter = if bounded && self.jitter_max > self.jitter_min {
            rand::rng().random_range(self.jitter_min..=self.jitter_max)
        } else if self.jitter_min.is_finite() {
            self.jitter_min
        } else {
            0.0
        };
        self.delay_with_jitter(attempt, jitter)
    }

    /// Reject policies whose delays cannot be computed.
    pub fn validate(&self, name: &str) -> anyhow::Result<()> {
        if !self.jitter_min.is_finite() || !self.jitter_max.is_finite() {
            return Err(anyhow::anyhow!("retry.{}: jitter bounds must be finite", name));
        }
        if self.jitter_min < 0.0 || self.jitter_min > self.jitter_max {
            return Err(anyhow::anyhow!(
                "retry.{}: jitter_min must be between 0 and jitter_max",
                name
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(anyhow::anyhow!(
                "retry.{}: max_delay_ms must not be below base_delay_ms",
                name
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::save()
    }
}

/// Per-operation policies. Every policy retries the same error kinds and
/// differs only in attempt counts and delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicies {
    pub save: RetryPolicy,
    pub fetch: RetryPolicy,
    pub auth: RetryPolicy,
}

impl RetryPolicies {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.save.validate("save")?;
        self.fetch.validate("fetch")?;
        self.auth.validate("auth")
    }
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            save: RetryPolicy::save(),
            fetch: RetryPolicy::fetch(),
            auth: RetryPolicy::auth(),
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy runs out of attempts. The last error is returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        match attempt_fn().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, attempt = attempt + 1, "Remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                debug!(operation, code = e.code(), error = %e, "Remote call failed, not retrying");
                return Err(e);
            }
            Err(e) if attempt + 1 >= attempts => {
                warn!(operation, attempts, error = %e, "Remote call failed, retries exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote call failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

use crate::application::ports::remote_api::RemoteResponse;
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use rand::Rng;
use std::time::Duration;

/// Result of one delivery attempt, after status-code classification.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Transient(AppError),
    Terminal(AppError),
}

impl AttemptOutcome {
    pub fn from_error(err: AppError) -> Self {
        if err.is_transient() {
            AttemptOutcome::Transient(err)
        } else {
            AttemptOutcome::Terminal(err)
        }
    }

    pub fn from_response(response: &RemoteResponse) -> Self {
        if response.is_success() {
            return AttemptOutcome::Success;
        }
        Self::from_error(AppError::from_status(
            response.status,
            response.body_excerpt(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Exhausted,
}

/// Exponential backoff shared by the mutation and upload processors.
///
/// `delay(n) = min(cap, base * 2^n)`, then scaled by a uniform factor in
/// `1 ± jitter_ratio` and capped again. Near the cap the lower half of the
/// band is cut off so the sequence stays non-decreasing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base: Duration,
    cap: Duration,
    jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration, cap: Duration, jitter_ratio: f64) -> Self {
        Self {
            max_retries,
            base,
            cap: cap.max(base),
            jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_cap_ms),
            config.jitter_ratio,
        )
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base
    }

    /// Un-jittered delay before attempt number `retry_count + 1`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Jittered delay before attempt `retry_count + 1`. The draw never falls
    /// below the highest delay the previous attempt could have drawn, so
    /// successive delays never shrink, even at the cap.
    pub fn jittered_delay(&self, retry_count: u32) -> Duration {
        let delay = self.backoff_delay(retry_count);
        if self.jitter_ratio <= 0.0 {
            return delay;
        }
        let floor = retry_count
            .checked_sub(1)
            .map(|previous| self.jitter_ceiling(previous))
            .unwrap_or(Duration::ZERO);
        let low = delay.mul_f64(1.0 - self.jitter_ratio).max(floor);
        let high = self.jitter_ceiling(retry_count).max(low);
        rand::thread_rng().gen_range(low..=high)
    }

    fn jitter_ceiling(&self, retry_count: u32) -> Duration {
        self.backoff_delay(retry_count)
            .mul_f64(1.0 + self.jitter_ratio)
            .min(self.cap)
    }

    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count < self.max_retries {
            RetryDecision::Retry {
                delay: self.jittered_delay(retry_count),
            }
        } else {
            RetryDecision::Exhausted
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

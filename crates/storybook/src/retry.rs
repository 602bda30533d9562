//! Exponential back-off schedule for rate-limited calls.
//!
//! The schedule is pure arithmetic; the sleeping loop that consumes it lives in
//! the infrastructure crate that owns the async runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay progression between attempts of a retried operation.
///
/// Attempt numbers are 1-based: attempt 1 is the initial call. The delay
/// before attempt `n + 1` is `initial * multiplier^(n - 1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSchedule {
    /// Delay before the first retry. Serialised as whole milliseconds.
    #[serde(with = "millis")]
    pub initial: Duration,
    /// Growth factor applied after every retry.
    pub multiplier: u32,
    /// Upper bound for any single delay, including server hints.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Total attempts including the initial call.
    pub max_attempts: u32,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(16),
            max_attempts: 4,
        }
    }
}

impl BackoffSchedule {
    /// A schedule that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based), ignoring the
    /// attempt limit.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before the attempt after `attempt`, or `None` once the attempt
    /// limit is reached. A server-provided `hint` replaces the computed delay.
    pub fn next_delay(&self, attempt: u32, hint: Option<Duration>) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(match hint {
            Some(after) => after.min(self.max_delay),
            None => self.delay_for(attempt),
        })
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

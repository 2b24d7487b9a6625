//! Poll limiter
//!
//! Token bucket with a burst of one: the first poll is admitted immediately and
//! later polls are spaced by at least the polling period.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tether_core::{CancellationToken, Error, Result};

/// Spaces polls by a fixed period
pub struct PollLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    period: Duration,
}

impl PollLimiter {
    /// Create a limiter admitting one poll per `period`
    pub fn new(period: Duration) -> Result<Self> {
        let quota = Quota::with_period(period)
            .ok_or_else(|| Error::Config("polling period must be greater than zero".to_string()))?
            .allow_burst(NonZeroU32::MIN);

        Ok(Self {
            limiter: GovernorRateLimiter::direct(quota),
            period,
        })
    }

    /// Polling period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until the next poll is admitted
    ///
    /// Returns [`Error::Cancelled`] as soon as `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl fmt::Debug for PollLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollLimiter")
            .field("period", &self.period)
            .finish()
    }
}

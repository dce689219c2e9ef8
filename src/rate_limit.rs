//! Blocking call-rate limiter built on `governor`.
//!
//! One limiter guards one outbound operation. Calls are spaced `period / calls`
//! apart with no burst allowance, so any window of `period` holds at most
//! `calls` completed calls. When no slot is open the calling thread sleeps;
//! nothing is ever rejected.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;

/// "At most `calls` invocations per `period`".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    pub calls: NonZeroU32,
    pub period: Duration,
}

impl RateQuota {
    pub const fn new(calls: NonZeroU32, period: Duration) -> Self {
        Self { calls, period }
    }

    /// 10 calls per second, the budget used for every place provider.
    pub const fn provider_default() -> Self {
        Self::new(nonzero(10), Duration::from_secs(1))
    }

    /// One call every 1.5 seconds, inside Nominatim's usage policy.
    pub const fn geocoder_default() -> Self {
        Self::new(nonzero(1), Duration::from_millis(1500))
    }

    fn to_governor(self) -> Quota {
        let replenish = self.period / self.calls.get();
        // A zero period would mean "unlimited"; clamp to 1ns so the quota stays valid.
        let replenish = replenish.max(Duration::from_nanos(1));
        Quota::with_period(replenish).unwrap_or_else(|| Quota::per_second(self.calls).allow_burst(NonZeroU32::MIN))
    }
}

const fn nonzero(n: u32) -> NonZeroU32 {
    match NonZeroU32::new(n) {
        Some(v) => v,
        None => NonZeroU32::MIN,
    }
}

pub struct RateLimiter {
    quota: RateQuota,
    inner: governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
}

impl RateLimiter {
    pub fn new(quota: RateQuota) -> Self {
        Self {
            quota,
            inner: governor::RateLimiter::direct(quota.to_governor()),
            clock: DefaultClock::default(),
        }
    }

    /// Block until one call is permitted.
    pub fn acquire(&self) {
        while let Err(not_until) = self.inner.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limit reached, sleeping");
            std::thread::sleep(wait);
        }
    }

    /// Run `f` once a slot is available.
    pub fn call<T>(&self, f: impl FnOnce() -> T) -> T {
        self.acquire();
        f()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").field("quota", &self.quota).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_calls_are_spaced_evenly() {
        let limiter = RateLimiter::new(RateQuota::new(nonzero(4), Duration::from_millis(200)));
        let start = Instant::now();
        let results: Vec<u32> = (0..3).map(|i| limiter.call(|| i)).collect();
        assert_eq!(results, vec![0, 1, 2]);
        // first call is free, the next two wait 50ms each
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_rolling_window_never_exceeds_quota() {
        let period = Duration::from_millis(300);
        let calls = 5;
        let limiter = RateLimiter::new(RateQuota::new(nonzero(calls), period));
        let start = Instant::now();
        let mut completed = Vec::new();
        while start.elapsed() < period * 2 {
            limiter.acquire();
            completed.push(Instant::now());
        }

        // 10ms of slack for the gap between the limiter's clock and the timestamps
        let window = period - Duration::from_millis(10);
        for (i, at) in completed.iter().enumerate() {
            let in_window = completed[i..].iter().take_while(|t| t.duration_since(*at) < window).count();
            assert!(in_window <= calls as usize, "{} calls inside one {:?} window", in_window, window);
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(RateQuota::provider_default().calls.get(), 10);
        assert_eq!(RateQuota::geocoder_default().period, Duration::from_millis(1500));
    }
}

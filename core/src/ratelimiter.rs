//! Launch pacing for probes spread across many hosts.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Highest launch rate honoured; faster requests are clamped to it.
pub const MAX_QPS: u32 = 1_000_000;

/// Token bucket with a burst of one. Each [`acquire`](RateLimiter::acquire)
/// consumes a token; a background task adds one every `1s / tokens_per_sec`.
pub struct RateLimiter {
    sem: Arc<Semaphore>,
    refill: JoinHandle<()>,
}

impl RateLimiter {
    /// Must be called from within a tokio runtime. The rate is clamped to
    /// `1..=MAX_QPS`.
    pub fn new(tokens_per_sec: u32) -> Self {
        let sem = Arc::new(Semaphore::new(1));
        let sem_bg = sem.clone();
        let period = Self::period(tokens_per_sec);
        let refill = tokio::spawn(async move {
            let mut t = interval_at(Instant::now() + period, period);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                t.tick().await;
                if sem_bg.available_permits() == 0 {
                    sem_bg.add_permits(1);
                }
            }
        });
        RateLimiter { sem, refill }
    }

    fn period(tokens_per_sec: u32) -> Duration {
        Duration::from_secs(1) / tokens_per_sec.clamp(1, MAX_QPS)
    }

    /// `None` when pacing is disabled (`0`).
    pub fn from_qps(qps: Option<u32>) -> Option<Self> {
        match qps {
            Some(q) if q > 0 => Some(Self::new(q)),
            _ => None,
        }
    }

    pub async fn acquire(&self) {
        if let Ok(permit) = self.sem.acquire().await {
            permit.forget();
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.refill.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn paces_launches() {
        let rl = RateLimiter::new(20);
        let start = std::time::Instant::now();
        for _ in 0..3 {
            rl.acquire().await;
        }
        // first token is free, the next two wait ~50ms each
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn period_never_reaches_zero() {
        assert_eq!(RateLimiter::period(u32::MAX), Duration::from_micros(1));
        assert_eq!(RateLimiter::period(2_000_000_000), Duration::from_micros(1));
        assert_eq!(RateLimiter::period(0), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn huge_rate_keeps_refilling() {
        let rl = RateLimiter::new(u32::MAX);
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            for _ in 0..50 {
                rl.acquire().await;
            }
        })
        .await;
        assert!(drained.is_ok());
    }

    #[tokio::test]
    async fn zero_qps_disables_pacing() {
        assert!(RateLimiter::from_qps(Some(0)).is_none());
        assert!(RateLimiter::from_qps(None).is_none());
        assert!(RateLimiter::from_qps(Some(5)).is_some());
    }
}

//! Time and randomness seams for the resilience primitives

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Source of monotonic time and suspension
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Source of the jitter fraction applied to a backoff window
pub trait JitterSource: Send + Sync {
    /// Uniform value in `[0.0, 1.0)`
    fn fraction(&self) -> f64;
}

/// Jitter drawn from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn fraction(&self) -> f64 {
        rand::random::<f64>()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock whose time only moves when told to; `sleep` advances it instantly
    #[derive(Debug)]
    pub struct ManualClock {
        origin: Instant,
        offset_ms: AtomicU64,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset_ms: AtomicU64::new(0),
                sleeps: Mutex::new(Vec::new()),
            }
        }

        pub fn advance(&self, duration: Duration) {
            self.offset_ms
                .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        }

        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            self.advance(duration);
            tokio::task::yield_now().await;
        }
    }

    /// Jitter that always returns the same fraction
    #[derive(Debug, Clone, Copy)]
    pub struct FixedJitter(pub f64);

    impl JitterSource for FixedJitter {
        fn fraction(&self) -> f64 {
            self.0
        }
    }
}

/// Per-provider token bucket bounding outbound request rate.
///
/// Each provider gets its own `RateLimiter` instance shared by every worker
/// thread targeting that provider, so a throttled provider never slows the
/// others. `acquire()` blocks the calling worker until a token accrues;
/// requests are delayed, never dropped. The bucket state behind the mutex
/// is the only state in the engine mutated by multiple tasks at once.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source seam so tests can drive the bucket with a simulated clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation used outside tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket: sustained `rate_per_sec` with `burst` capacity.
pub struct RateLimiter {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<Bucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// # Panics
    /// Panics if `rate_per_sec` is not positive or `burst` is zero. Limits
    /// come from validated run configuration; a zero rate would deadlock
    /// every worker.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self::with_clock(rate_per_sec, burst, Arc::new(SystemClock))
    }

    pub fn with_clock(rate_per_sec: f64, burst: u32, clock: Arc<dyn Clock>) -> Self {
        assert!(
            rate_per_sec > 0.0 && rate_per_sec.is_finite(),
            "rate_per_sec must be positive, got {}",
            rate_per_sec
        );
        assert!(burst > 0, "burst capacity must be at least 1");

        let now = clock.now();
        Self {
            rate_per_sec,
            burst: f64::from(burst),
            state: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: now,
            }),
            clock,
        }
    }

    /// Takes one token, sleeping until one accrues. Concurrent callers each
    /// reserve their own deficit; nothing is lost if several wake at once —
    /// whoever finds the bucket empty sleeps again for the remainder.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.state.lock().unwrap();
                let now = self.clock.now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate_per_sec)
            };
            // Lock released while sleeping.
            self.clock.sleep(wait);
        }
    }
}

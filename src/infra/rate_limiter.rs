use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Paces outgoing requests with a requests-per-minute token bucket.
/// An unlimited limiter never waits.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Mutex<Bucket>>,
}

#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    last: Instant,
}

impl RateLimiter {
    pub fn per_minute(requests_per_min: Option<u64>) -> Self {
        let bucket = requests_per_min.filter(|rpm| *rpm > 0).map(|rpm| {
            Mutex::new(Bucket {
                capacity: rpm as f64,
                tokens: rpm as f64,
                last: Instant::now(),
            })
        });
        Self { bucket }
    }

    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    /// Wait until one request may be sent
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        // refill continuously, wait until a whole token accumulates
        loop {
            let mut guard = bucket.lock().await;
            let now = Instant::now();
            let elapsed = now.duration_since(guard.last).as_secs_f64();
            let refill_rate = guard.capacity / 60.0;
            guard.tokens = (guard.tokens + elapsed * refill_rate).min(guard.capacity);
            guard.last = now;
            if guard.tokens >= 1.0 {
                guard.tokens -= 1.0;
                break;
            }
            let secs = (1.0 - guard.tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_never_waits() {
        let limiter = RateLimiter::per_minute(None);
        let start = Instant::now();
        for _ in 0..1000 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn full_bucket_allows_a_burst() {
        let limiter = RateLimiter::per_minute(Some(30));
        let start = Instant::now();
        for _ in 0..30 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn empty_bucket_waits_for_refill() {
        // one token per second
        let limiter = RateLimiter::per_minute(Some(60));
        for _ in 0..60 {
            limiter.acquire().await;
        }
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}

// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-bucket rate limiting for task submission.
//!
//! A single in-process bucket: capacity `requests`, refilled continuously
//! over `window_seconds`. Rejected submissions cost nothing and take no
//! queue slot.

use std::sync::Mutex;
use std::time::Instant;

use gitbay_config::model::RateLimitConfig;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.requests as f64;
        Self {
            capacity,
            refill_per_sec: capacity / config.window_seconds as f64,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token. Returns false when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests: u32, window_seconds: u64) -> RateLimitConfig {
        RateLimitConfig {
            requests,
            window_seconds,
        }
    }

    #[test]
    fn allows_up_to_capacity_then_rejects() {
        let limiter = RateLimiter::new(&config(3, 60));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn refills_over_time() {
        let limiter = RateLimiter::new(&config(10, 1));
        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());

        // 10 tokens per second: ~200ms buys back a couple.
        std::thread::sleep(std::time::Duration::from_millis(250));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn never_exceeds_capacity_after_idle() {
        let limiter = RateLimiter::new(&config(2, 1));
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }
}

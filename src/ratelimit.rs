//! Sliding-window rate limiter for source calls.
//!
//! The loader awaits [`RateLimiter::wait_if_needed`] immediately before
//! every source call. The limiter blocks only long enough to keep the
//! caller under the configured requests-per-window ceiling; it performs
//! no backoff of its own.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::RateLimitConfig;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests.max(1),
            window: Duration::from_secs_f64(config.per_seconds),
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Sleep until issuing one more request stays under the ceiling,
    /// then record the request.
    pub async fn wait_if_needed(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().unwrap();
                let now = Instant::now();
                while let Some(front) = timestamps.front() {
                    if now.duration_since(*front) >= self.window {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }

                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    return;
                }

                // The oldest request still inside the window decides how
                // long until a slot frees up.
                self.window - now.duration_since(*timestamps.front().unwrap())
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached");
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests recorded inside the current window.
    pub fn requests_in_current_window(&self) -> usize {
        let timestamps = self.timestamps.lock().unwrap();
        let now = Instant::now();
        timestamps
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

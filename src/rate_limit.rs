//! Rolling-window rate limiter for the text-generation service.
//!
//! The limiter keeps a log of admitted request times. A request is
//! admitted only while fewer than `R` requests were admitted in the
//! trailing window `W`, so for any admitted sequence `t[i + R] - t[i] >= W`.
//! A provider's explicit exhaustion signal blocks all admissions until its
//! `Retry-After` has elapsed.
//!
//! Time comes from a [`Clock`]; production uses [`TokioClock`], which
//! honors tokio's paused test clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Source of time for the limiter.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Pure window bookkeeping, no waiting.
#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    window: Duration,
    admitted: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl SlidingWindow {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            admitted: VecDeque::with_capacity(capacity),
            blocked_until: None,
        }
    }

    /// Admit a request at `now`, or return how long to wait before asking again.
    pub fn try_reserve(&mut self, now: Instant) -> Result<(), Duration> {
        if let Some(until) = self.blocked_until {
            if now < until {
                return Err(until - now);
            }
            self.blocked_until = None;
        }

        while let Some(&oldest) = self.admitted.front() {
            if now.duration_since(oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }

        if self.admitted.len() < self.capacity {
            self.admitted.push_back(now);
            return Ok(());
        }

        match self.admitted.front() {
            Some(&oldest) => Err((oldest + self.window).saturating_duration_since(now)),
            None => Ok(()),
        }
    }

    /// Refuse every admission until `now + duration`. Never shortens an
    /// existing block.
    pub fn block_for(&mut self, now: Instant, duration: Duration) {
        let until = now + duration;
        self.blocked_until = Some(match self.blocked_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Shared, awaitable limiter. Clone the `Arc`, not the limiter.
pub struct RateLimiter {
    state: Mutex<SlidingWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self::with_clock(capacity, window, Arc::new(TokioClock))
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_window, config.window())
    }

    pub fn with_clock(capacity: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(SlidingWindow::new(capacity, window)),
            clock,
        }
    }

    /// Wait until a request may be sent, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                match state.try_reserve(self.clock.now()) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit window full");
            self.clock.sleep(wait).await;
        }
    }

    /// Record the provider's rate-limit signal. Blocks for `retry_after`,
    /// or one full window when the provider gave no hint.
    pub async fn signal_exhausted(&self, retry_after: Option<Duration>) {
        let mut state = self.state.lock().await;
        let duration = retry_after.unwrap_or(state.window());
        tracing::warn!(
            block_ms = duration.as_millis() as u64,
            "provider reported rate limit exhaustion"
        );
        state.block_for(self.clock.now(), duration);
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

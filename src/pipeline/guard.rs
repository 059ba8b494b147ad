//! Crash-loop guard
//!
//! Sliding-window restart limiter with systemd `StartLimitIntervalSec` /
//! `StartLimitBurst` semantics: once `burst` failures land inside `interval`
//! the pipeline is no longer relaunched until someone resets the guard.

use racecast_shared::RESTART_LIMIT_MARKER;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart,
    LimitHit,
}

#[derive(Debug)]
pub struct CrashLoopGuard {
    interval: Duration,
    burst: usize,
    failures: VecDeque<Instant>,
}

impl CrashLoopGuard {
    pub fn new(interval: Duration, burst: usize) -> Self {
        Self {
            interval,
            burst: burst.max(1),
            failures: VecDeque::with_capacity(burst),
        }
    }

    pub fn record_failure(&mut self, now: Instant) -> RestartDecision {
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) >= self.interval {
                self.failures.pop_front();
            } else {
                break;
            }
        }
        self.failures.push_back(now);

        if self.failures.len() >= self.burst {
            RestartDecision::LimitHit
        } else {
            RestartDecision::Restart
        }
    }

    pub fn reset(&mut self) {
        self.failures.clear();
    }

    /// Text reported as the streaming error once the limit is hit
    pub fn limit_message(&self) -> String {
        format!(
            "{}: {} failures within {}s",
            RESTART_LIMIT_MARKER,
            self.burst,
            self.interval.as_secs()
        )
    }
}

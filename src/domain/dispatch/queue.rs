//! Queue entries for side effects awaiting delivery.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{IdempotencyKey, SideEffect};
use crate::domain::foundation::Timestamp;

/// Delay before the retry following `attempts` failed attempts.
///
/// `base * 2^(attempts - 1)`, saturating.
pub fn retry_delay(base: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryState {
    /// An attempt is running.
    InFlight,

    /// Waiting for the next retry.
    Scheduled,

    /// Attempts exhausted; kept for inspection.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub at: Timestamp,
    pub error: String,
}

/// What the queue does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedSideEffect {
    pub id: IdempotencyKey,
    pub effect: SideEffect,

    /// Completed (failed) attempts so far.
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_attempt: Option<Timestamp>,
    pub last_error: Option<String>,
    pub state: QueueEntryState,
    pub next_attempt_at: Option<Timestamp>,
    pub history: Vec<AttemptRecord>,
}

impl QueuedSideEffect {
    pub fn new(effect: SideEffect, max_attempts: u32) -> Self {
        Self {
            id: effect.idempotency_key(),
            effect,
            attempts: 0,
            max_attempts,
            last_attempt: None,
            last_error: None,
            state: QueueEntryState::InFlight,
            next_attempt_at: None,
            history: Vec::new(),
        }
    }

    /// Marks an attempt as started.
    pub fn begin_attempt(&mut self, now: Timestamp) {
        self.state = QueueEntryState::InFlight;
        self.last_attempt = Some(now);
        self.next_attempt_at = None;
    }

    /// Records a failed attempt and decides whether to retry.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        now: Timestamp,
        base_delay: Duration,
    ) -> RetryDecision {
        let error = error.into();
        self.attempts += 1;
        self.history.push(AttemptRecord {
            attempt: self.attempts,
            at: now,
            error: error.clone(),
        });
        self.last_error = Some(error);

        if self.attempts >= self.max_attempts {
            self.state = QueueEntryState::Failed;
            self.next_attempt_at = None;
            return RetryDecision::Exhausted;
        }

        let delay = retry_delay(base_delay, self.attempts);
        self.state = QueueEntryState::Scheduled;
        self.next_attempt_at = Some(now.add_std(delay));
        RetryDecision::RetryAfter(delay)
    }

    /// Records a failure no retry can fix and marks the entry failed.
    pub fn record_permanent_failure(&mut self, error: impl Into<String>, now: Timestamp) {
        let error = error.into();
        self.attempts += 1;
        self.history.push(AttemptRecord {
            attempt: self.attempts,
            at: now,
            error: error.clone(),
        });
        self.last_error = Some(error);
        self.state = QueueEntryState::Failed;
        self.next_attempt_at = None;
    }

    pub fn is_failed(&self) -> bool {
        self.state == QueueEntryState::Failed
    }

    /// Gives a failed entry a fresh set of attempts. History is kept.
    pub fn rearm(&mut self) -> bool {
        if !self.is_failed() {
            return false;
        }
        self.attempts = 0;
        self.state = QueueEntryState::InFlight;
        true
    }
}

/// Read-only snapshot of the dispatcher queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Entries in flight or waiting for a retry.
    pub pending: usize,

    /// Entries that exhausted their attempts.
    pub failed: usize,

    /// Keys delivered during this process lifetime.
    pub delivered: usize,

    pub entries: Vec<QueuedSideEffect>,
}

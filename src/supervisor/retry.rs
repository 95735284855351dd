//! Minimum-interval gate for broker connection attempts

/// Default minimum delay between connection attempts
pub const DEFAULT_BACKOFF_MS: u64 = 5000;

/// Whether a connection attempt may start now (pure decision)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Attempt now
    Proceed,
    /// Backoff still running
    Wait { remaining_ms: u64 },
}

/// Tracks the last attempt and enforces a fixed backoff interval
///
/// The interval is measured between attempt start times, whatever the
/// outcome of each attempt. `None` means no attempt has been made yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTimer {
    last_attempt_ms: Option<u64>,
    backoff_interval_ms: u64,
}

impl Default for RetryTimer {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_MS)
    }
}

impl RetryTimer {
    pub fn new(backoff_interval_ms: u64) -> Self {
        Self {
            last_attempt_ms: None,
            backoff_interval_ms,
        }
    }

    pub fn backoff_interval_ms(&self) -> u64 {
        self.backoff_interval_ms
    }

    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.last_attempt_ms
    }

    pub fn decide(&self, now: u64) -> AttemptDecision {
        match self.remaining_ms(now) {
            0 => AttemptDecision::Proceed,
            remaining_ms => AttemptDecision::Wait { remaining_ms },
        }
    }

    pub fn permits(&self, now: u64) -> bool {
        self.decide(now) == AttemptDecision::Proceed
    }

    /// Time left before the next attempt is allowed
    ///
    /// A clock reading earlier than the last attempt counts as no time elapsed.
    pub fn remaining_ms(&self, now: u64) -> u64 {
        match self.last_attempt_ms {
            None => 0,
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                self.backoff_interval_ms.saturating_sub(elapsed)
            }
        }
    }

    /// Must be called immediately before every attempt
    pub fn record_attempt(&mut self, now: u64) {
        self.last_attempt_ms = Some(now);
    }
}

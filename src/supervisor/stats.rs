use crate::dispatch::DispatchOutcome;
use std::collections::VecDeque;

/// Running counters kept by the supervisor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub sessions_established: u64,
    pub sessions_dropped: u64,
    pub link_polls: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
    pub actuator_failures: u64,
    /// Timestamp of every connection attempt, oldest first, capped
    pub attempt_log: VecDeque<u64>,
}

/// Attempt timestamps kept for inspection
pub const ATTEMPT_LOG_CAPACITY: usize = 64;

impl SupervisorStats {
    pub fn record_attempt(&mut self, now: u64) {
        self.connect_attempts += 1;
        if self.attempt_log.len() == ATTEMPT_LOG_CAPACITY {
            self.attempt_log.pop_front();
        }
        self.attempt_log.push_back(now);
    }

    pub fn record_dispatch(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Delivered { .. } => self.messages_delivered += 1,
            DispatchOutcome::Dropped(_) => self.messages_dropped += 1,
            DispatchOutcome::ActuatorFailed { .. } => self.actuator_failures += 1,
        }
    }

    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.attempt_log.back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;

    #[test]
    fn test_attempt_log_is_capped() {
        let mut stats = SupervisorStats::default();
        for i in 0..(ATTEMPT_LOG_CAPACITY as u64 + 5) {
            stats.record_attempt(i * 5000);
        }
        assert_eq!(stats.connect_attempts, ATTEMPT_LOG_CAPACITY as u64 + 5);
        assert_eq!(stats.attempt_log.len(), ATTEMPT_LOG_CAPACITY);
        assert_eq!(stats.attempt_log[0], 5 * 5000);
        assert_eq!(stats.last_attempt_ms(), Some((ATTEMPT_LOG_CAPACITY as u64 + 4) * 5000));
    }

    #[test]
    fn test_record_dispatch_outcomes() {
        let mut stats = SupervisorStats::default();
        stats.record_dispatch(&DispatchOutcome::Delivered {
            target_value: "x".to_string(),
        });
        stats.record_dispatch(&DispatchOutcome::Dropped(DispatchError::RetainedReplay));
        stats.record_dispatch(&DispatchOutcome::ActuatorFailed {
            reason: "busy".to_string(),
        });
        assert_eq!(
            (stats.messages_delivered, stats.messages_dropped, stats.actuator_failures),
            (1, 1, 1)
        );
    }
}

//! Two-tier abuse detection.
//!
//! Every resolved command attempt is recorded against two rolling windows
//! per sender: one counting repetitions of the same command keyword and one
//! counting all commands. Crossing either threshold yields a
//! [`PolicyOutcome::Violation`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::PolicyOutcome;
use super::store::{MemoryStore, StateStore};
use crate::error::{AbuseViolation, ViolationKind};

/// Thresholds for [`AbuseDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbuseLimits {
    /// Repetitions of one keyword tolerated within `same_command_window`.
    pub same_command_limit: u32,
    pub same_command_window: Duration,
    /// Commands of any kind tolerated within `volume_window`.
    pub volume_limit: u32,
    pub volume_window: Duration,
}

impl Default for AbuseLimits {
    fn default() -> Self {
        Self {
            same_command_limit: 10,
            same_command_window: Duration::from_secs(300),
            volume_limit: 30,
            volume_window: Duration::from_secs(300),
        }
    }
}

/// Repetition counter for the sender's most recent keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SameCommandCounter {
    pub command: String,
    pub count: u32,
    pub since: Instant,
}

/// Counter over every command the sender issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeCounter {
    pub count: u32,
    pub since: Instant,
}

/// Both counters for one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageCounters {
    pub same: SameCommandCounter,
    pub volume: VolumeCounter,
}

impl UsageCounters {
    fn fresh(command: &str, now: Instant) -> Self {
        Self {
            same: SameCommandCounter {
                command: command.to_string(),
                count: 0,
                since: now,
            },
            volume: VolumeCounter {
                count: 0,
                since: now,
            },
        }
    }
}

fn expired(since: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(since) > window
}

/// Per-sender rolling usage counters.
#[derive(Clone)]
pub struct AbuseDetector {
    limits: AbuseLimits,
    store: Arc<dyn StateStore<UsageCounters>>,
}

impl AbuseDetector {
    pub fn new(limits: AbuseLimits) -> Self {
        Self::with_store(limits, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(limits: AbuseLimits, store: Arc<dyn StateStore<UsageCounters>>) -> Self {
        Self { limits, store }
    }

    pub fn limits(&self) -> &AbuseLimits {
        &self.limits
    }

    /// Records one use of `command` by `sender`.
    ///
    /// The same-command check runs first; when it fails the volume counter
    /// is left untouched. Counters are not reset on a violation.
    pub fn record(&self, sender: &str, command: &str, now: Instant) -> PolicyOutcome {
        let limits = self.limits;
        let mut outcome = PolicyOutcome::Allowed;

        self.store.modify(sender, &mut |slot| {
            let counters = slot.get_or_insert_with(|| UsageCounters::fresh(command, now));

            let same = &mut counters.same;
            if same.command != command || expired(same.since, now, limits.same_command_window) {
                *same = SameCommandCounter {
                    command: command.to_string(),
                    count: 1,
                    since: now,
                };
            } else {
                same.count += 1;
                if same.count > limits.same_command_limit {
                    outcome = PolicyOutcome::Violation(AbuseViolation::new(
                        ViolationKind::SameCommand,
                    ));
                    return;
                }
            }

            let volume = &mut counters.volume;
            if expired(volume.since, now, limits.volume_window) {
                *volume = VolumeCounter {
                    count: 1,
                    since: now,
                };
            } else {
                volume.count += 1;
                if volume.count > limits.volume_limit {
                    outcome = PolicyOutcome::Violation(AbuseViolation::new(ViolationKind::Volume));
                }
            }
        });

        if let PolicyOutcome::Violation(v) = &outcome {
            debug!(sender, command, kind = v.kind.as_str(), "Abuse threshold crossed");
        }
        outcome
    }

    /// Current counters for `sender`.
    pub fn counters(&self, sender: &str) -> Option<UsageCounters> {
        self.store.get(sender)
    }

    /// Drops senders whose windows have both expired.
    pub fn sweep(&self, now: Instant) -> usize {
        let limits = self.limits;
        self.store.retain(&mut |_, c| {
            !expired(c.same.since, now, limits.same_command_window)
                || !expired(c.volume.since, now, limits.volume_window)
        })
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(kind: ViolationKind) -> PolicyOutcome {
        PolicyOutcome::Violation(AbuseViolation::new(kind))
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleventh_repeat_is_violation() {
        let detector = AbuseDetector::new(AbuseLimits::default());
        let now = Instant::now();

        for _ in 0..10 {
            assert_eq!(detector.record("alice", "wiki", now), PolicyOutcome::Allowed);
        }
        assert_eq!(
            detector.record("alice", "wiki", now),
            violation(ViolationKind::SameCommand)
        );
        // Not reset by the violation.
        assert_eq!(
            detector.record("alice", "wiki", now),
            violation(ViolationKind::SameCommand)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keyword_resets_same_counter() {
        let detector = AbuseDetector::new(AbuseLimits::default());
        let now = Instant::now();

        for _ in 0..10 {
            detector.record("alice", "wiki", now);
        }
        assert_eq!(detector.record("alice", "ping", now), PolicyOutcome::Allowed);
        assert_eq!(detector.record("alice", "wiki", now), PolicyOutcome::Allowed);
        assert_eq!(detector.counters("alice").unwrap().same.count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_resets_same_counter() {
        let detector = AbuseDetector::new(AbuseLimits::default());
        let start = Instant::now();

        for _ in 0..10 {
            detector.record("alice", "wiki", start);
        }
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(
            detector.record("alice", "wiki", Instant::now()),
            PolicyOutcome::Allowed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_thirty_first_command_is_volume_violation() {
        let detector = AbuseDetector::new(AbuseLimits::default());
        let now = Instant::now();

        for i in 0..30 {
            let command = format!("cmd{}", i % 3);
            assert_eq!(detector.record("bob", &command, now), PolicyOutcome::Allowed);
        }
        assert_eq!(
            detector.record("bob", "other", now),
            violation(ViolationKind::Volume)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_command_short_circuits_volume() {
        let limits = AbuseLimits {
            same_command_limit: 2,
            ..AbuseLimits::default()
        };
        let detector = AbuseDetector::new(limits);
        let now = Instant::now();

        detector.record("carol", "wiki", now);
        detector.record("carol", "wiki", now);
        assert_eq!(
            detector.record("carol", "wiki", now),
            violation(ViolationKind::SameCommand)
        );
        assert_eq!(detector.counters("carol").unwrap().volume.count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_senders_are_independent() {
        let limits = AbuseLimits {
            same_command_limit: 1,
            ..AbuseLimits::default()
        };
        let detector = AbuseDetector::new(limits);
        let now = Instant::now();

        assert_eq!(detector.record("a", "wiki", now), PolicyOutcome::Allowed);
        assert_eq!(detector.record("b", "wiki", now), PolicyOutcome::Allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_stale_senders() {
        let detector = AbuseDetector::new(AbuseLimits::default());
        detector.record("old", "wiki", Instant::now());

        tokio::time::advance(Duration::from_secs(200)).await;
        detector.record("fresh", "wiki", Instant::now());

        tokio::time::advance(Duration::from_secs(101)).await;
        assert_eq!(detector.sweep(Instant::now()), 1);
        assert!(detector.counters("old").is_none());
        assert!(detector.counters("fresh").is_some());
    }
}

//! Escalating temporary bans.
//!
//! A detector violation opens a ban window for the sender. Attempts made
//! inside the window are blocked with a countdown, then with a softer
//! reminder, and finally routed to the sanction collaborator.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::store::{MemoryStore, StateStore};
use super::{BanTier, PolicyOutcome};

/// Ban window and escalation ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanPolicy {
    pub window: Duration,
    /// Highest count still answered with a reminder instead of escalation.
    pub warn_ceiling: u32,
}

impl Default for BanPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            warn_ceiling: 5,
        }
    }
}

/// Ban record for one sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanState {
    pub count: u32,
    pub since: Instant,
}

/// Per-sender ban state.
#[derive(Clone)]
pub struct BanTracker {
    policy: BanPolicy,
    store: Arc<dyn StateStore<BanState>>,
}

impl BanTracker {
    pub fn new(policy: BanPolicy) -> Self {
        Self::with_store(policy, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(policy: BanPolicy, store: Arc<dyn StateStore<BanState>>) -> Self {
        Self { policy, store }
    }

    pub fn policy(&self) -> &BanPolicy {
        &self.policy
    }

    /// Checks whether `sender` may proceed.
    ///
    /// Blocked attempts increment the count; escalation leaves it as is.
    pub fn check(&self, sender: &str, now: Instant) -> PolicyOutcome {
        let policy = self.policy;
        let mut outcome = PolicyOutcome::Allowed;

        self.store.modify(sender, &mut |slot| {
            let Some(state) = slot.as_mut() else {
                return;
            };
            let elapsed = now.saturating_duration_since(state.since);
            if elapsed >= policy.window {
                return;
            }

            let remaining = policy.window - elapsed;
            outcome = if state.count < 2 {
                state.count += 1;
                PolicyOutcome::Blocked {
                    tier: BanTier::First,
                    remaining,
                }
            } else if state.count <= policy.warn_ceiling {
                state.count += 1;
                PolicyOutcome::Blocked {
                    tier: BanTier::Repeat,
                    remaining,
                }
            } else {
                PolicyOutcome::Escalated
            };
        });

        if outcome != PolicyOutcome::Allowed {
            debug!(sender, ?outcome, "Sender is banned");
        }
        outcome
    }

    /// Opens a fresh ban window, replacing any prior state.
    pub fn on_violation(&self, sender: &str, now: Instant) {
        self.store.set(sender, BanState { count: 1, since: now });
    }

    pub fn state(&self, sender: &str) -> Option<BanState> {
        self.store.get(sender)
    }

    /// Drops ban states whose window has passed.
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.policy.window;
        self.store
            .retain(&mut |_, s| now.saturating_duration_since(s.since) < window)
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}

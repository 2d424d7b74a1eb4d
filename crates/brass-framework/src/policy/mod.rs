//! Usage policy state: abuse counters, temporary bans and execution locks.
//!
//! All of it is owned by a [`Dispatcher`](crate::Dispatcher) instance. The
//! detector and tracker report their decisions as a [`PolicyOutcome`] which
//! the chain loop interprets; nothing here unwinds to signal a stop.

mod abuse;
mod ban;
mod lock;
mod store;

use std::time::Duration;

pub use abuse::{AbuseDetector, AbuseLimits, SameCommandCounter, UsageCounters, VolumeCounter};
pub use ban::{BanPolicy, BanState, BanTracker};
pub use lock::{ExecutionLock, ExecutionLockSet};
pub use store::{MemoryStore, StateStore};

use crate::error::AbuseViolation;

/// Which ban notice applies to a blocked attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanTier {
    /// First attempt after the ban opened; shows the countdown.
    First,
    /// Later attempts within the window.
    Repeat,
}

/// The decision of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Allowed,
    /// An abuse threshold was crossed.
    Violation(AbuseViolation),
    /// The sender is inside a ban window.
    Blocked { tier: BanTier, remaining: Duration },
    /// The sender kept trying past the reminder ceiling.
    Escalated,
}

impl PolicyOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

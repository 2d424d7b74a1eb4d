//! # Brass Framework
//!
//! The command and trigger dispatch engine.
//!
//! This layer provides:
//! - Module model: command, regex-trigger and description-only modules
//! - Tower-based handler services with a scoped typing indicator
//! - Argument grammars (usage patterns, and clap with the `command` feature)
//! - Usage policy: per-sender execution locks, a two-tier abuse detector and
//!   an escalating temporary-ban tracker
//! - The [`Dispatcher`] that ties it together
//!
//! Everything the host application owns (module loading, sender lists,
//! sanctions) is consumed through the [`ModuleRegistry`], [`SenderPolicy`]
//! and [`Sanction`] contracts.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod grammar;
pub mod handler;
pub mod module;
pub mod notice;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod sanction;
pub mod sender;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::MessageContext;
pub use dispatcher::{DispatchReport, Dispatcher, Halt, Step, SweepReport};
pub use error::{AbuseViolation, GrammarError, GrammarResult, ModuleError, ResolveError, ViolationKind};
pub use grammar::{ArgValue, CommandParser, Grammar, ParsedArgs, UsagePattern};
pub use handler::{BoxedHandler, HandlerFn, HandlerPanic, HandlerResult, into_handler, invoke};
pub use module::{
    Captured, CommandEntry, CommandModule, MatchMode, Module, RegexEntry, RegexFlags, RegexMatch,
    RegexModule, StubModule,
};
pub use notice::{Notices, render};
pub use policy::{
    AbuseDetector, AbuseLimits, BanPolicy, BanState, BanTier, BanTracker, ExecutionLock,
    ExecutionLockSet, MemoryStore, PolicyOutcome, StateStore, UsageCounters,
};
pub use registry::{ModuleCatalog, ModuleRegistry, StaticRegistry};
pub use resolver::{CommandResolver, Resolved};
pub use sanction::{LogSanction, Sanction};
pub use sender::{MemorySenderPolicy, SenderPolicy};
pub use settings::DispatchSettings;

//! # Brass
//!
//! The message dispatch core of a chat bot.
//!
//! ## Overview
//!
//! Brass turns an incoming message into module invocations:
//!
//! ```text
//! ┌───────────┐    ┌──────────────────────────────────────┐    ┌──────────────────┐
//! │ Transport │───▶│ Dispatcher                           │───▶│ Command handlers │
//! │ (Session) │    │ prefix → chain → lock → ban → abuse  │    └──────────────────┘
//! └───────────┘    │ → resolve → permission → grammar     │    ┌──────────────────┐
//!                  │ regex pass over unprefixed text      │───▶│ Regex triggers   │
//!                  └──────────────────────────────────────┘    └──────────────────┘
//! ```
//!
//! - **Core**: the [`Session`](core::Session) contract a transport implements
//! - **Framework**: modules, grammars, usage policy and the dispatcher
//! - **Runtime**: configuration, logging and the background sweeper
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brass::prelude::*;
//!
//! async fn ping(ctx: Arc<MessageContext>) -> Result<(), BoxError> {
//!     ctx.reply("pong").await;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = StaticRegistry::new()
//!         .with(CommandModule::new("ping").base(true).handle(ping));
//!
//!     let runtime = BrassRuntime::builder()
//!         .registry(Arc::new(registry))
//!         .build()?;
//!
//!     runtime.start().await;
//!     // runtime.handle(session) for every incoming message
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `command`: clap-backed argument grammars

pub use brass_core as core;
pub use brass_framework as framework;
pub use brass_runtime as runtime;

pub use async_trait::async_trait;

/// Commonly used types for building a bot on Brass.
///
/// ```rust,ignore
/// use brass::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use brass_runtime::{BrassConfig, BrassRuntime};

    // Transport contract
    pub use async_trait::async_trait;
    pub use brass_core::{BoxError, BoxedSession, Session, SessionResult, TypingGuard};

    // Modules and handlers
    pub use brass_framework::{
        AbuseViolation, ArgValue, CommandEntry, CommandModule, Grammar, MatchMode,
        MessageContext, ParsedArgs, RegexEntry, RegexFlags, RegexMatch, RegexModule, StubModule,
        ViolationKind,
    };

    // Host-owned contracts
    pub use brass_framework::{
        MemorySenderPolicy, ModuleRegistry, Sanction, SenderPolicy, StaticRegistry,
    };
}

//! The transport-facing session contract.
//!
//! A [`Session`] is what a platform adapter hands to the dispatcher for each
//! inbound message. It identifies the sender and the conversation, exposes
//! the message's display text, and provides the few capabilities the
//! dispatcher needs: replying, checking superuser status, checking admin
//! permission in the current conversation, and an optional typing indicator.
//!
//! # Example
//!
//! ```rust,ignore
//! use brass_core::{Session, SessionResult};
//!
//! struct ConsoleSession { text: String }
//!
//! #[async_trait::async_trait]
//! impl Session for ConsoleSession {
//!     fn sender_id(&self) -> &str { "console|user" }
//!     fn target_id(&self) -> &str { "console|tty" }
//!     fn display(&self) -> String { self.text.clone() }
//!
//!     async fn send_message(&self, text: &str) -> SessionResult<()> {
//!         println!("{text}");
//!         Ok(())
//!     }
//!
//!     async fn check_superuser(&self) -> bool { true }
//!     async fn check_permission(&self) -> bool { true }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SessionResult;
use crate::typing::TypingGuard;

/// One inbound message as seen by the dispatcher.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Identity of the sender; the key for locks, counters and bans.
    fn sender_id(&self) -> &str;

    /// Identity of the conversation the message arrived in.
    fn target_id(&self) -> &str;

    /// Platform kind of the sender (e.g. `"QQ"`).
    fn sender_from(&self) -> &str {
        ""
    }

    /// Platform kind of the target (e.g. `"QQ|Group"`).
    fn target_from(&self) -> &str {
        ""
    }

    /// The message rendered as plain display text.
    fn display(&self) -> String;

    /// Sends a reply into the conversation.
    async fn send_message(&self, text: &str) -> SessionResult<()>;

    /// Whether the sender is a superuser of this bot.
    async fn check_superuser(&self) -> bool;

    /// Whether the sender administers the current conversation.
    async fn check_permission(&self) -> bool;

    /// Starts a typing indicator; it stops when the guard drops.
    fn typing(&self) -> TypingGuard {
        TypingGuard::noop()
    }
}

/// A shared, type-erased session.
pub type BoxedSession = Arc<dyn Session>;

//! Per-dispatch message context.
//!
//! A [`MessageContext`] wraps the transport [`Session`] for the duration of
//! one dispatch call. The dispatcher rewrites its mutable parts as it walks
//! the chained sub-commands, and handlers read them:
//!
//! - [`trigger_msg`](MessageContext::trigger_msg): the current sub-command
//!   with the prefix stripped and any alias already substituted
//! - [`parsed_msg`](MessageContext::parsed_msg): typed arguments produced by
//!   the module's grammar, or `None` for grammar-less handlers
//! - [`matched_msg`](MessageContext::matched_msg): the regex result for
//!   implicit triggers
//!
//! Sub-commands run strictly one after another, so each handler observes the
//! values set for its own sub-command.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::grammar::ParsedArgs;
use crate::module::RegexMatch;
use brass_core::{BoxedSession, Session};

/// The context handed to module handlers.
pub struct MessageContext {
    session: BoxedSession,
    display: String,
    trigger_msg: RwLock<String>,
    parsed_msg: RwLock<Option<ParsedArgs>>,
    matched_msg: RwLock<Option<RegexMatch>>,
}

impl MessageContext {
    /// Creates a context for `session` with already-normalized display text.
    pub fn new(session: BoxedSession, display: impl Into<String>) -> Self {
        let display = display.into();
        Self {
            session,
            trigger_msg: RwLock::new(display.clone()),
            display,
            parsed_msg: RwLock::new(None),
            matched_msg: RwLock::new(None),
        }
    }

    /// Returns the underlying session.
    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    /// Returns a clone of the session `Arc`.
    pub fn session_arc(&self) -> BoxedSession {
        Arc::clone(&self.session)
    }

    pub fn sender_id(&self) -> &str {
        self.session.sender_id()
    }

    pub fn target_id(&self) -> &str {
        self.session.target_id()
    }

    /// The normalized display text of the whole message.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The sub-command currently being dispatched.
    pub fn trigger_msg(&self) -> String {
        self.trigger_msg.read().clone()
    }

    pub(crate) fn set_trigger_msg(&self, text: impl Into<String>) {
        *self.trigger_msg.write() = text.into();
    }

    /// Typed arguments for the current sub-command, if its module declares a
    /// grammar.
    pub fn parsed_msg(&self) -> Option<ParsedArgs> {
        self.parsed_msg.read().clone()
    }

    pub(crate) fn set_parsed_msg(&self, parsed: Option<ParsedArgs>) {
        *self.parsed_msg.write() = parsed;
    }

    /// The regex result for the trigger currently being invoked.
    pub fn matched_msg(&self) -> Option<RegexMatch> {
        self.matched_msg.read().clone()
    }

    pub(crate) fn set_matched_msg(&self, matched: Option<RegexMatch>) {
        *self.matched_msg.write() = matched;
    }

    /// Sends a reply, logging instead of failing when delivery breaks.
    ///
    /// The dispatcher uses this for every policy notice so that a broken
    /// transport never aborts a dispatch.
    pub async fn reply(&self, text: &str) {
        if let Err(e) = self.session.send_message(text).await {
            warn!(sender = %self.sender_id(), error = %e, "Failed to deliver reply");
        }
    }
}

impl fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("sender", &self.sender_id())
            .field("target", &self.target_id())
            .field("display", &self.display)
            .field("trigger_msg", &*self.trigger_msg.read())
            .finish_non_exhaustive()
    }
}

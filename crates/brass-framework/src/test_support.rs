//! Test doubles shared by the unit tests of this crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::context::MessageContext;
use crate::sanction::Sanction;
use brass_core::{Session, SessionResult, TypingGuard};

/// A session that records replies and typing indicator use.
#[derive(Debug, Default)]
pub struct RecordingSession {
    sender: String,
    target: String,
    display: Mutex<String>,
    superuser: AtomicBool,
    admin: AtomicBool,
    replies: Mutex<Vec<String>>,
    typing_started: Arc<AtomicUsize>,
    typing_stopped: Arc<AtomicUsize>,
}

impl RecordingSession {
    pub fn new(sender: &str, target: &str) -> Arc<Self> {
        Arc::new(Self {
            sender: sender.to_string(),
            target: target.to_string(),
            ..Self::default()
        })
    }

    pub fn with_display(sender: &str, target: &str, display: &str) -> Arc<Self> {
        let session = Self::new(sender, target);
        session.set_display(display);
        session
    }

    pub fn set_display(&self, display: &str) {
        *self.display.lock() = display.to_string();
    }

    pub fn set_superuser(&self, value: bool) {
        self.superuser.store(value, Ordering::SeqCst);
    }

    pub fn set_admin(&self, value: bool) {
        self.admin.store(value, Ordering::SeqCst);
    }

    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().clone()
    }

    pub fn take_replies(&self) -> Vec<String> {
        std::mem::take(&mut *self.replies.lock())
    }

    pub fn typing_started(&self) -> usize {
        self.typing_started.load(Ordering::SeqCst)
    }

    pub fn typing_stopped(&self) -> usize {
        self.typing_stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for RecordingSession {
    fn sender_id(&self) -> &str {
        &self.sender
    }

    fn target_id(&self) -> &str {
        &self.target
    }

    fn display(&self) -> String {
        self.display.lock().clone()
    }

    async fn send_message(&self, text: &str) -> SessionResult<()> {
        self.replies.lock().push(text.to_string());
        Ok(())
    }

    async fn check_superuser(&self) -> bool {
        self.superuser.load(Ordering::SeqCst)
    }

    async fn check_permission(&self) -> bool {
        self.admin.load(Ordering::SeqCst)
    }

    fn typing(&self) -> TypingGuard {
        self.typing_started.fetch_add(1, Ordering::SeqCst);
        let stopped = Arc::clone(&self.typing_stopped);
        TypingGuard::new(move || {
            stopped.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// A sanction sink that records every warning.
#[derive(Debug, Default)]
pub struct RecordingSanction {
    warnings: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingSanction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `(sender, reason)` pairs in call order.
    pub fn warnings(&self) -> Vec<(String, Option<String>)> {
        self.warnings.lock().clone()
    }
}

#[async_trait]
impl Sanction for RecordingSanction {
    async fn warn_target(&self, ctx: &MessageContext, reason: Option<&str>) {
        self.warnings
            .lock()
            .push((ctx.sender_id().to_string(), reason.map(String::from)));
    }
}

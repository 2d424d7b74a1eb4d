//! Sanction sink contract.

use async_trait::async_trait;
use tracing::warn;

use crate::context::MessageContext;
use crate::notice::{Notices, render};

/// Receives senders who crossed an abuse threshold or kept going while
/// banned.
#[async_trait]
pub trait Sanction: Send + Sync {
    /// Warns the sender of `ctx`. `reason` is `None` on ban escalation.
    async fn warn_target(&self, ctx: &MessageContext, reason: Option<&str>);
}

/// Default sanction sink: logs the warning and tells the sender.
#[derive(Debug, Clone, Default)]
pub struct LogSanction {
    notices: Notices,
}

impl LogSanction {
    pub fn new(notices: Notices) -> Self {
        Self { notices }
    }
}

#[async_trait]
impl Sanction for LogSanction {
    async fn warn_target(&self, ctx: &MessageContext, reason: Option<&str>) {
        let reason = reason.unwrap_or("repeated attempts while banned");
        warn!(sender = %ctx.sender_id(), target = %ctx.target_id(), reason, "Warning sender");
        ctx.reply(&render(&self.notices.warned, &[("reason", reason)]))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSession;

    #[tokio::test]
    async fn test_log_sanction_replies() {
        let session = RecordingSession::new("alice", "group");
        let ctx = MessageContext::new(session.clone(), "~wiki");

        LogSanction::default()
            .warn_target(&ctx, Some("spamming"))
            .await;
        assert_eq!(session.replies(), vec!["Warning: spamming".to_string()]);
    }
}

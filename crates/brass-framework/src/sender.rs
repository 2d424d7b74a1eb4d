//! Sender policy contract: black/white lists and module enablement.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

/// Per-sender and per-target policy data owned by the host application.
#[async_trait]
pub trait SenderPolicy: Send + Sync {
    async fn is_blacklisted(&self, sender: &str) -> bool;

    /// Whitelisting overrides the blacklist.
    async fn is_whitelisted(&self, sender: &str) -> bool;

    /// Keywords of the modules enabled in `target`.
    async fn enabled_modules(&self, target: &str) -> HashSet<String>;
}

/// In-memory [`SenderPolicy`].
#[derive(Debug, Default)]
pub struct MemorySenderPolicy {
    blacklist: RwLock<HashSet<String>>,
    whitelist: RwLock<HashSet<String>>,
    enabled: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemorySenderPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blacklist(&self, sender: impl Into<String>) {
        self.blacklist.write().insert(sender.into());
    }

    pub fn whitelist(&self, sender: impl Into<String>) {
        self.whitelist.write().insert(sender.into());
    }

    pub fn enable(&self, target: impl Into<String>, module: impl Into<String>) {
        self.enabled
            .write()
            .entry(target.into())
            .or_default()
            .insert(module.into().to_lowercase());
    }

    pub fn disable(&self, target: &str, module: &str) {
        if let Some(modules) = self.enabled.write().get_mut(target) {
            modules.remove(&module.to_lowercase());
        }
    }
}

#[async_trait]
impl SenderPolicy for MemorySenderPolicy {
    async fn is_blacklisted(&self, sender: &str) -> bool {
        self.blacklist.read().contains(sender)
    }

    async fn is_whitelisted(&self, sender: &str) -> bool {
        self.whitelist.read().contains(sender)
    }

    async fn enabled_modules(&self, target: &str) -> HashSet<String> {
        self.enabled.read().get(target).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enable_and_disable() {
        let policy = MemorySenderPolicy::new();
        policy.enable("group", "Wiki");
        policy.enable("group", "ping");
        policy.disable("group", "ping");

        let enabled = policy.enabled_modules("group").await;
        assert!(enabled.contains("wiki"));
        assert!(!enabled.contains("ping"));
        assert!(policy.enabled_modules("other").await.is_empty());
    }

    #[test]
    fn test_lists() {
        let policy = MemorySenderPolicy::new();
        policy.blacklist("mallory");
        policy.whitelist("alice");

        tokio_test::block_on(async {
            assert!(policy.is_blacklisted("mallory").await);
            assert!(!policy.is_blacklisted("alice").await);
            assert!(policy.is_whitelisted("alice").await);
        });
    }
}

//! Dispatcher settings.

use crate::notice::Notices;
use crate::policy::{AbuseLimits, BanPolicy};

/// Tunables of a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Command prefixes; the first one is used in usage output.
    pub prefixes: Vec<String>,
    pub chain_separator: String,
    /// Chain cap for senders that are not superusers.
    pub max_chained: usize,
    pub limits: AbuseLimits,
    pub ban: BanPolicy,
    /// Appended to developer-facing notices when set.
    pub issue_url: Option<String>,
    pub notices: Notices,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            prefixes: vec!["~".into(), "～".into()],
            chain_separator: "&&".into(),
            max_chained: 5,
            limits: AbuseLimits::default(),
            ban: BanPolicy::default(),
            issue_url: None,
            notices: Notices::default(),
        }
    }
}

impl DispatchSettings {
    /// The prefix shown to users.
    pub fn display_prefix(&self) -> &str {
        self.prefixes.first().map(String::as_str).unwrap_or_default()
    }

    /// The `{report}` fill-in for developer-facing notices.
    pub fn report_suffix(&self) -> String {
        match &self.issue_url {
            Some(url) => crate::notice::render(&self.notices.report_suffix, &[("url", url.as_str())]),
            None => String::new(),
        }
    }
}

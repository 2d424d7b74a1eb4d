//! Error types for the Brass dispatch engine.

use thiserror::Error;

/// Which abuse threshold was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// The same command was repeated too often within the window.
    SameCommand,
    /// Too many commands of any kind within the window.
    Volume,
}

impl ViolationKind {
    /// Returns a short stable name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameCommand => "same-command",
            Self::Volume => "volume",
        }
    }
}

/// Raised when a sender exceeds an abuse threshold.
///
/// Handlers may also return this error to request the same treatment as a
/// detector-raised violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("abuse threshold exceeded ({})", kind.as_str())]
pub struct AbuseViolation {
    /// The threshold that was crossed.
    pub kind: ViolationKind,
}

impl AbuseViolation {
    pub fn new(kind: ViolationKind) -> Self {
        Self { kind }
    }
}

/// Errors from command resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The first token names no known module.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

/// Errors from argument grammar parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// The user's input matches none of the declared grammars.
    ///
    /// `usage` is the text shown back to the user.
    #[error("invalid command format")]
    InvalidFormat {
        /// Formatted usage listing for the module.
        usage: String,
    },

    /// A grammar declaration is malformed. This is a developer error.
    #[error("invalid help doc '{pattern}': {reason}")]
    InvalidHelpDoc {
        /// The offending declaration.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl GrammarError {
    pub(crate) fn invalid_doc(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHelpDoc {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while building modules.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// A regex trigger pattern failed to compile.
    #[error("invalid regex for module '{module}': {source}")]
    InvalidRegex {
        /// The module keyword.
        module: String,
        /// The compile error.
        #[source]
        source: regex::Error,
    },

    /// The match mode string is not recognised.
    #[error("unknown match mode '{0}' (expected M/MATCH or A/FINDALL)")]
    UnknownMatchMode(String),
}

/// Result type for grammar operations.
pub type GrammarResult<T> = Result<T, GrammarError>;

//! # Brass Core
//!
//! Contracts shared by every layer of the Brass command dispatcher.
//!
//! This crate is intentionally small. It defines what the dispatch engine
//! needs from the outside world and nothing more:
//!
//! - **Session**: the transport-facing view of one inbound message
//!   ([`Session`], [`BoxedSession`]), including reply delivery and the
//!   superuser / admin capability checks
//! - **Typing indicator**: a scoped guard that closes the indicator on every
//!   exit path ([`TypingGuard`])
//! - **Text helpers**: display-text normalization used before prefix
//!   detection ([`remove_duplicate_space`], [`remove_ineffective_text`])
//! - **Errors**: transport failures and the boxed handler error type
//!
//! Platform adapters implement [`Session`]; the framework crate consumes it.
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌───────────┐
//! │   Adapter   │────▶│ Dispatcher │────▶│  Module   │
//! │  (Session)  │     │ (framework)│────▶│  Handler  │
//! └─────────────┘     └────────────┘     └───────────┘
//! ```

pub mod error;
pub mod session;
pub mod text;
pub mod typing;

pub use error::{BoxError, SessionError, SessionResult};
pub use session::{BoxedSession, Session};
pub use text::{remove_duplicate_space, remove_ineffective_text};
pub use typing::TypingGuard;

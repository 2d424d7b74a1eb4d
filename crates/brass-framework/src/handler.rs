//! Handler services for module entries.
//!
//! Every handler bound to a module is stored as a [`BoxedHandler`], a
//! cloneable tower service from `Arc<MessageContext>` to `()`. Plain async
//! functions are adapted with [`into_handler`]:
//!
//! ```rust,ignore
//! async fn ping(ctx: Arc<MessageContext>) -> Result<(), BoxError> {
//!     ctx.reply("pong").await;
//!     Ok(())
//! }
//!
//! let handler = into_handler(ping);
//! ```
//!
//! The dispatcher never calls a handler directly. It goes through
//! [`invoke`], which optionally stacks a [`TypingLayer`] on top and converts
//! a panic inside the handler into an ordinary [`HandlerPanic`] error.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};

use crate::context::MessageContext;
use brass_core::BoxError;

/// Result returned by every handler.
pub type HandlerResult = Result<(), BoxError>;

/// A type-erased handler that can be stored in a module's match list.
pub type BoxedHandler = BoxCloneSyncService<Arc<MessageContext>, (), BoxError>;

// ============================================================================
// HandlerFn
// ============================================================================

/// Functions usable as module handlers.
///
/// Implemented for every `Fn(Arc<MessageContext>) -> impl Future<Output =
/// Result<(), E>>` where `E` converts into [`BoxError`].
pub trait HandlerFn: Clone + Send + Sync + 'static {
    /// Runs the handler.
    fn call(&self, ctx: Arc<MessageContext>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, E> HandlerFn for F
where
    F: Fn(Arc<MessageContext>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    fn call(&self, ctx: Arc<MessageContext>) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(ctx);
        async move { fut.await.map_err(Into::into) }.boxed()
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] that calls a single handler function.
#[derive(Clone)]
pub struct HandlerService<F> {
    handler: F,
}

impl<F> HandlerService<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F: HandlerFn> Service<Arc<MessageContext>> for HandlerService<F> {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<MessageContext>) -> Self::Future {
        self.handler.call(ctx)
    }
}

/// Converts a handler function into a boxed handler.
pub fn into_handler<F: HandlerFn>(f: F) -> BoxedHandler {
    BoxCloneSyncService::new(HandlerService::new(f))
}

// ============================================================================
// TypingLayer
// ============================================================================

/// A tower [`Layer`] that shows the session's typing indicator while the
/// inner service runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypingLayer;

impl<S> Layer<S> for TypingLayer {
    type Service = TypingService<S>;

    fn layer(&self, inner: S) -> TypingService<S> {
        TypingService { inner }
    }
}

/// The [`Service`] produced by [`TypingLayer`].
#[derive(Clone)]
pub struct TypingService<S> {
    inner: S,
}

impl<S> Service<Arc<MessageContext>> for TypingService<S>
where
    S: Service<Arc<MessageContext>, Response = (), Error = BoxError>,
    S::Future: Send + 'static,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, HandlerResult>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: Arc<MessageContext>) -> Self::Future {
        let guard = ctx.session().typing();
        let fut = self.inner.call(ctx);
        async move {
            let _guard = guard;
            fut.await
        }
        .boxed()
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// A handler panicked instead of returning an error.
#[derive(Debug, Clone, Error)]
#[error("handler panicked: {0}")]
pub struct HandlerPanic(pub String);

impl HandlerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self(message)
    }
}

/// Calls `handler` once, bracketed by the typing indicator when requested.
///
/// Panics are caught and reported as [`HandlerPanic`]; the typing guard is
/// dropped on every path.
pub async fn invoke(
    handler: &BoxedHandler,
    ctx: Arc<MessageContext>,
    show_typing: bool,
) -> HandlerResult {
    let call = if show_typing {
        TypingLayer.layer(handler.clone()).oneshot(ctx).boxed()
    } else {
        handler.clone().oneshot(ctx).boxed()
    };

    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Box::new(HandlerPanic::from_payload(payload))),
    }
}

//! Go-like cancellation contexts for cooperative task trees.
//!
//! A [`Context`] is a cheaply cloneable handle that becomes "done" when its
//! owning [`Handler`] is cancelled (or dropped), or when a parent context is
//! cancelled. Work observes cancellation either by awaiting [`Context::done`]
//! directly or by racing an arbitrary future against it with
//! [`ContextFutExt::with_context`].
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context as TaskContext, Poll};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A cancellable context, cheaply [`Clone`]able and shareable across tasks.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
}

/// Owns the cancellation of a [`Context`] tree.
///
/// Dropping a `Handler` cancels its context, mirroring the convention that a
/// cancel function should fire once the work it guards is no longer needed,
/// even if the caller never calls [`Handler::cancel`] explicitly.
#[derive(Debug)]
pub struct Handler {
    token: CancellationToken,
}

impl Context {
    /// Creates a new root context and the [`Handler`] that controls it.
    pub fn new() -> (Context, Handler) {
        let token = CancellationToken::new();
        (Context { token: token.clone() }, Handler { token })
    }

    /// Returns a process-wide context that this crate never cancels.
    ///
    /// Useful as a default for callers that want to participate in the
    /// `Context` API without wiring up their own cancellation tree.
    pub fn global() -> Context {
        static GLOBAL: OnceLock<CancellationToken> = OnceLock::new();
        Context {
            token: GLOBAL.get_or_init(CancellationToken::new).clone(),
        }
    }

    /// Creates a child context, along with its own [`Handler`], that is also
    /// cancelled whenever `self` is cancelled.
    pub fn with_parent(&self) -> (Context, Handler) {
        let token = self.token.child_token();
        (Context { token: token.clone() }, Handler { token })
    }

    /// Returns `true` if this context has already been cancelled.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns a future that resolves once this context is cancelled.
    pub fn done(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

impl Handler {
    /// Cancels the context owned by this handler.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a new handle to the context owned by this handler.
    pub fn context(&self) -> Context {
        Context { token: self.token.clone() }
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pin_project_lite::pin_project! {
    /// Future returned by [`ContextFutExt::with_context`].
    pub struct WithContext<'a, F> {
        #[pin]
        fut: F,
        #[pin]
        done: WaitForCancellationFuture<'a>,
    }
}

impl<F: Future> Future for WithContext<'_, F> {
    type Output = Option<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();

        // Poll the wrapped future first so that a context cancelled in the
        // same wakeup as completion still yields the result, not `None`.
        if let Poll::Ready(output) = this.fut.poll(cx) {
            return Poll::Ready(Some(output));
        }

        if this.done.poll(cx).is_ready() {
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}

/// Extension trait for racing a future against a [`Context`]'s cancellation.
pub trait ContextFutExt: Future + Sized {
    /// Runs `self` until it completes or `ctx` is cancelled, whichever comes first.
    ///
    /// Returns `None` if `ctx` was cancelled before `self` completed.
    fn with_context(self, ctx: &Context) -> WithContext<'_, Self>;
}

impl<F: Future> ContextFutExt for F {
    fn with_context(self, ctx: &Context) -> WithContext<'_, Self> {
        WithContext {
            fut: self,
            done: ctx.done(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completes_before_cancellation() {
        let (ctx, _handler) = Context::new();
        let result = async { 42 }.with_context(&ctx).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_pending_future() {
        let (ctx, handler) = Context::new();
        handler.cancel();
        let result = std::future::pending::<()>().with_context(&ctx).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn dropping_handler_cancels_context() {
        let (ctx, handler) = Context::new();
        assert!(!ctx.is_done());
        drop(handler);
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn child_context_cancelled_with_parent() {
        let (parent, parent_handler) = Context::new();
        let (child, _child_handler) = parent.with_parent();
        assert!(!child.is_done());
        parent_handler.cancel();
        assert!(child.is_done());
    }

    #[tokio::test]
    async fn global_context_is_never_done() {
        let ctx = Context::global();
        assert!(!ctx.is_done());
        tokio::time::timeout(Duration::from_millis(1), ctx.done())
            .await
            .expect_err("global context should never be cancelled");
    }
}

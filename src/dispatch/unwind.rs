//! Panic containment for hook futures.

use crate::core::HookResult;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Boxed future returned by a lifecycle hook.
pub(crate) type HookFuture<'a> = Pin<Box<dyn Future<Output = HookResult> + Send + 'a>>;

/// Polls a hook future, turning a panic during any poll into an `Err`.
///
/// Once a panic is caught the inner future is never polled again.
pub(crate) struct CatchUnwind<'a> {
    inner: HookFuture<'a>,
}

impl<'a> CatchUnwind<'a> {
    pub(crate) fn new(inner: HookFuture<'a>) -> Self {
        Self { inner }
    }
}

impl Future for CatchUnwind<'_> {
    type Output = HookResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = self.get_mut().inner.as_mut();
        match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(poll) => poll,
            Err(payload) => Poll::Ready(Err(anyhow::anyhow!(
                "hook panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

//! Cancellable subscription streams.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::Result;

/// The items produced for a `subscribe` call.
///
/// Ends when the terminating link closes the stream or when the
/// subscription is cancelled. Cancelling, or dropping the subscription,
/// cancels the token shared by every stage of the chain.
pub struct Subscription<T = Value> {
    key: String,
    stream: BoxStream<'static, Result<T>>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        key: impl Into<String>,
        stream: BoxStream<'static, Result<T>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            key: key.into(),
            stream,
            cancel,
        }
    }

    /// The procedure key this subscription was opened for.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.stream.poll_next_unpin(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

//! The link contract: one stage of a client pipeline.
//!
//! A link receives an [`Operation`] together with a [`Next`] handle to the
//! rest of the chain. Middleware forwards with `next.run(op)` and may
//! observe or transform the response; a terminating link answers the
//! operation itself and drops `next`.
//!
//! Links are invoked in attachment order: the first attached link runs
//! first and forwards to the second.
//!
//! ```
//! use rspc_client::link::{Link, LinkResponse, Operation};
//! use rspc_client::flags::Passthrough;
//! use rspc_client::{Next, Procedures};
//!
//! /// Rewrites every key into a versioned namespace.
//! struct Versioned;
//!
//! impl<P: Procedures> Link<P> for Versioned {
//!     type Output = P;
//!     type Flag = Passthrough;
//!
//!     fn name(&self) -> &str {
//!         "versioned"
//!     }
//!
//!     fn call(&self, mut op: Operation, next: Next) -> LinkResponse {
//!         op.key = format!("v1.{}", op.key);
//!         next.run(op)
//!     }
//! }
//! ```

pub mod fn_link;
pub mod logger;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::LinkError;
use crate::flags::LinkFlag;
use crate::procedures::{ProcedureKind, Procedures};

pub use crate::pipeline::chain::{into_dyn, DynLink, Next};
pub use fn_link::FnLink;
pub use logger::LoggerLink;

/// The context handed to each link for one invocation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Identifier unique within the pipeline that issued the operation
    pub id: u64,
    pub kind: ProcedureKind,
    /// Procedure key. Links may rewrite it before forwarding.
    pub key: String,
    pub input: Value,
    cancel: CancellationToken,
}

impl Operation {
    pub fn new(
        id: u64,
        kind: ProcedureKind,
        key: impl Into<String>,
        input: Value,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            kind,
            key: key.into(),
            input,
            cancel,
        }
    }

    /// The token every stage of this invocation shares. It is cancelled when
    /// the caller cancels or drops the pending operation.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// What a link produces for an operation.
///
/// Always a stream: queries and mutations use the first item, subscriptions
/// use every item until the stream ends or is cancelled.
pub struct LinkResponse {
    inner: BoxStream<'static, Result<Value, LinkError>>,
}

impl LinkResponse {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Value, LinkError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// A response with exactly one item, produced by `future`.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, LinkError>> + Send + 'static,
    {
        Self::from_stream(stream::once(future))
    }

    pub fn value(value: Value) -> Self {
        Self::from_stream(stream::iter([Ok(value)]))
    }

    pub fn error(error: LinkError) -> Self {
        Self::from_stream(stream::iter([Err(error)]))
    }

    /// A response that ends without producing anything.
    pub fn empty() -> Self {
        Self::from_stream(stream::empty())
    }

    #[must_use]
    pub fn map_err<F>(self, f: F) -> Self
    where
        F: FnMut(LinkError) -> LinkError + Send + 'static,
    {
        Self::from_stream(self.inner.map_err(f))
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<Value, LinkError>> {
        self.inner
    }
}

impl Stream for LinkResponse {
    type Item = Result<Value, LinkError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// One pipeline stage.
///
/// `P` is the procedure set the link receives, [`Link::Output`] the set it
/// exposes to the stages and caller after it, and [`Link::Flag`] what it
/// contributes to the builder's flags.
pub trait Link<P: Procedures>: Send + Sync + 'static {
    type Output: Procedures;
    type Flag: LinkFlag;

    /// Name used in logs and to attribute errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn call(&self, op: Operation, next: Next) -> LinkResponse;
}

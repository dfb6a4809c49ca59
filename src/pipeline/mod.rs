//! Shared pipeline state and operation execution.
//!
//! Both the typed [`Client`](crate::Client) and the runtime
//! [`DynClient`](crate::DynClient) wrap a [`Pipeline`]: the procedure set in
//! effect, the accumulated flags, and the chain of attached links. A
//! pipeline is an immutable value; attaching a link or building returns a
//! successor that shares the existing links with its predecessor.
//!
//! Executing an operation validates the key against the procedure set,
//! creates the cancellation token every stage shares, and runs the chain
//! from the first attached link.

pub mod chain;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::{BuildSettings, InitOptions, Subscription};
use crate::errors::{Error, Result};
use crate::flags::{ClientState, Flag, FlagSet};
use crate::link::Operation;
use crate::procedures::{ProcedureKind, ProcedureSchema};

use self::chain::{Chain, DynLink, Next};

/// Cache key for a query: the procedure key, followed by the input unless it
/// is `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    pub fn new(key: &str, input: Value) -> Self {
        let mut parts = vec![Value::String(key.to_string())];
        if !input.is_null() {
            parts.push(input);
        }
        Self(parts)
    }

    pub fn key(&self) -> Option<&str> {
        self.0.first().and_then(Value::as_str)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

#[derive(Clone)]
pub(crate) struct Pipeline {
    schema: Arc<ProcedureSchema>,
    chain: Chain,
    flags: FlagSet,
    options: Arc<InitOptions>,
    ids: Arc<AtomicU64>,
}

impl Pipeline {
    pub(crate) fn new(schema: Arc<ProcedureSchema>, options: InitOptions) -> Self {
        Self {
            schema,
            chain: Chain::new(),
            flags: FlagSet::EMPTY,
            options: Arc::new(options),
            ids: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn flags(&self) -> FlagSet {
        self.flags
    }

    pub(crate) fn state(&self) -> ClientState {
        ClientState::from_flags(self.flags)
    }

    pub(crate) fn schema(&self) -> &ProcedureSchema {
        &self.schema
    }

    pub(crate) fn link_names(&self) -> Vec<String> {
        self.chain.names()
    }

    /// Append `link` without validating it against the current flags.
    pub(crate) fn attach(&self, link: Arc<dyn DynLink>) -> Self {
        let flags = self.flags.union(link.flags());
        let schema = link.project(&self.schema);
        log::debug!(
            "attached link `{}` at position {} (flags: {} -> {})",
            link.name(),
            self.chain.len(),
            self.flags,
            flags
        );

        Self {
            schema,
            chain: self.chain.push(link),
            flags,
            options: Arc::clone(&self.options),
            ids: Arc::clone(&self.ids),
        }
    }

    /// Mark the pipeline built, without validating the current flags.
    pub(crate) fn finalize(&self, settings: BuildSettings) -> Self {
        let mut flags = self.flags.with(Flag::Built);
        if !settings.supports_subscriptions {
            flags = flags.with(Flag::SubscriptionsUnsupported);
        }
        log::debug!(
            "built pipeline with {} link(s) (flags: {})",
            self.chain.len(),
            flags
        );

        Self {
            flags,
            ..self.clone()
        }
    }

    /// Hand `error` to the `on_error` hook and return it.
    pub(crate) fn report(&self, error: Error) -> Error {
        log::debug!("{} error: {}", error.category(), error);
        self.options.notify(&error);
        error
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }

    fn operation(&self, kind: ProcedureKind, key: &str, input: Value, cancel: &CancellationToken) -> Operation {
        Operation::new(self.next_id(), kind, key, input, cancel.clone())
    }

    /// Run a query or mutation and return its first response item.
    pub(crate) async fn execute(
        &self,
        kind: ProcedureKind,
        key: &str,
        input: Value,
        parent: Option<&CancellationToken>,
    ) -> Result<Value> {
        self.schema.resolve(kind, key)?;

        let cancel = child_token(parent);
        // Dropping this future cancels every stage still holding the token.
        let _guard = cancel.clone().drop_guard();

        let op = self.operation(kind, key, input, &cancel);
        let span = tracing::debug_span!("operation", id = op.id, kind = %kind, key = %key);
        let mut response = span.in_scope(|| Next::start(self.chain.clone()).run(op));

        let first = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = response.next() => Some(item),
            }
        }
        .instrument(span)
        .await;

        match first {
            None => Err(Error::Cancelled {
                key: key.to_string(),
            }),
            Some(Some(Ok(value))) => Ok(value),
            Some(Some(Err(err))) => Err(Error::Link(err)),
            Some(None) => Err(Error::NoResponse {
                key: key.to_string(),
            }),
        }
    }

    /// Serialize `input`, execute, and deserialize the response.
    ///
    /// The returned future owns everything it needs, so it can be spawned.
    pub(crate) fn request<O>(
        &self,
        kind: ProcedureKind,
        key: &str,
        input: Result<Value>,
        cancel: Option<CancellationToken>,
    ) -> impl Future<Output = Result<O>> + Send + 'static
    where
        O: DeserializeOwned + Send + 'static,
    {
        let pipeline = self.clone();
        let key = key.to_string();

        async move {
            let result = match input {
                Ok(input) => pipeline.execute(kind, &key, input, cancel.as_ref()).await,
                Err(err) => Err(err),
            };
            result
                .and_then(|value| decode(&key, value))
                .map_err(|err| pipeline.report(err))
        }
    }

    /// Open a subscription. Fails before any link runs if `key` is not a
    /// declared subscription.
    pub(crate) fn subscribe<O>(
        &self,
        key: &str,
        input: Result<Value>,
        parent: Option<&CancellationToken>,
    ) -> Result<Subscription<O>>
    where
        O: DeserializeOwned + Send + 'static,
    {
        let input = input.map_err(|err| self.report(err))?;
        self.schema
            .resolve(ProcedureKind::Subscription, key)
            .map_err(|err| self.report(err))?;

        let cancel = child_token(parent);
        let op = self.operation(ProcedureKind::Subscription, key, input, &cancel);
        log::debug!("opening subscription #{} `{}`", op.id, key);
        let response = Next::start(self.chain.clone()).run(op);

        let pipeline = self.clone();
        let item_key = key.to_string();
        let stream = response
            .take_until(cancel.clone().cancelled_owned())
            .map(move |item| {
                item.map_err(Error::Link)
                    .and_then(|value| decode(&item_key, value))
                    .map_err(|err| pipeline.report(err))
            })
            .boxed();

        Ok(Subscription::new(key, stream, cancel))
    }

    pub(crate) fn query_key(&self, key: &str, input: Result<Value>) -> Result<QueryKey> {
        let input = input.map_err(|err| self.report(err))?;
        self.schema
            .resolve(ProcedureKind::Query, key)
            .map_err(|err| self.report(err))?;
        Ok(QueryKey::new(key, input))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("flags", &self.flags)
            .field("links", &self.chain)
            .field("procedures", &self.schema.len())
            .finish()
    }
}

fn child_token(parent: Option<&CancellationToken>) -> CancellationToken {
    parent.map_or_else(CancellationToken::new, CancellationToken::child_token)
}

pub(crate) fn encode<I: Serialize>(key: &str, input: &I) -> Result<Value> {
    serde_json::to_value(input).map_err(|source| Error::Serialize {
        key: key.to_string(),
        source: Arc::new(source),
    })
}

fn decode<O: DeserializeOwned>(key: &str, value: Value) -> Result<O> {
    serde_json::from_value(value).map_err(|source| Error::Deserialize {
        key: key.to_string(),
        source: Arc::new(source),
    })
}

//! The typed client builder.
//!
//! [`Client<P, F>`] carries the current procedure set `P` and flag state
//! `F` in its type. Each method is implemented only for the flag states in
//! which it is legal, so an illegal pipeline does not compile:
//!
//! | state                          | `use_link` | `build` | `query`/`mutate` | `subscribe` |
//! |--------------------------------|:----------:|:-------:|:----------------:|:-----------:|
//! | open                           | yes        | yes     | no               | no          |
//! | terminated                     | no         | no      | yes              | unless `subscriptionsUnsupported` |
//! | built                          | no         | no      | yes              | unless `subscriptionsUnsupported` |
//!
//! `use_link` and `build` take `&self` and return a successor; the original
//! builder stays usable with its original flags.

mod dynamic;
mod options;
mod subscription;

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::flags::{
    Bool, BuiltFlags, ClientState, FlagSet, FlagState, Flags, JoinFlags, No, NoFlags,
    Operational,
};
use crate::link::{into_dyn, Link};
use crate::pipeline::{encode, Pipeline, QueryKey};
use crate::procedures::{schema_of, ProcedureKind, ProcedureSchema, Procedures};

pub use dynamic::DynClient;
pub use options::{BuildOptions, BuildSettings, InitOptions};
pub use subscription::Subscription;

/// Create an open client bound to the full procedure set `P`.
///
/// ```
/// use rspc_client::{init, ClientState, InitOptions};
///
/// let client = init::<()>(InitOptions::new());
/// assert_eq!(client.state(), ClientState::Open);
/// assert!(client.flags().is_empty());
/// ```
pub fn init<P: Procedures>(options: InitOptions) -> Client<P, NoFlags> {
    Client::from_pipeline(Pipeline::new(schema_of::<P>(), options))
}

/// A client pipeline whose available operations follow from its flags.
///
/// Building with subscriptions waived removes `subscribe`, and a built
/// client no longer accepts links:
///
/// ```
/// use rspc_client::flags::No;
/// use rspc_client::link::LoggerLink;
/// use rspc_client::{init, BuildOptions, InitOptions};
///
/// let client = init::<()>(InitOptions::new())
///     .use_link(LoggerLink::new())
///     .build(BuildOptions::new().supports_subscriptions(No));
/// let _pending = client.query::<serde_json::Value>("version", ());
/// ```
///
/// ```compile_fail
/// use rspc_client::flags::No;
/// use rspc_client::link::LoggerLink;
/// use rspc_client::{init, BuildOptions, InitOptions};
///
/// let client = init::<()>(InitOptions::new())
///     .use_link(LoggerLink::new())
///     .build(BuildOptions::new().supports_subscriptions(No));
/// let _ = client.subscribe::<serde_json::Value>("events", ());
/// ```
///
/// ```compile_fail
/// use rspc_client::link::LoggerLink;
/// use rspc_client::{init, BuildOptions, InitOptions};
///
/// let client = init::<()>(InitOptions::new()).build(BuildOptions::new());
/// let _ = client.use_link(LoggerLink::new());
/// ```
///
/// ```compile_fail
/// use rspc_client::{init, BuildOptions, InitOptions};
///
/// let client = init::<()>(InitOptions::new()).build(BuildOptions::new());
/// let _ = client.build(BuildOptions::new());
/// ```
///
/// An open client cannot run operations:
///
/// ```compile_fail
/// use rspc_client::{init, InitOptions};
///
/// let client = init::<()>(InitOptions::new());
/// let _ = client.query::<serde_json::Value>("version", ());
/// ```
///
/// A terminated client cannot be built:
///
/// ```compile_fail
/// use rspc_client::link::{FnLink, LinkResponse};
/// use rspc_client::{init, BuildOptions, InitOptions};
///
/// let client = init::<()>(InitOptions::new())
///     .use_link(FnLink::new("ws", |_| LinkResponse::empty()));
/// let _ = client.build(BuildOptions::new());
/// ```
///
/// A terminating link without subscription support removes `subscribe`:
///
/// ```compile_fail
/// use rspc_client::link::{FnLink, LinkResponse};
/// use rspc_client::{init, InitOptions};
///
/// let client = init::<()>(InitOptions::new())
///     .use_link(FnLink::without_subscriptions("http", |_| LinkResponse::empty()));
/// let _ = client.subscribe::<serde_json::Value>("events", ());
/// ```
///
/// A terminating link must be the last stage:
///
/// ```compile_fail
/// use rspc_client::link::{FnLink, LinkResponse, LoggerLink};
/// use rspc_client::{init, InitOptions};
///
/// let client = init::<()>(InitOptions::new())
///     .use_link(FnLink::new("ws", |_| LinkResponse::empty()));
/// let _ = client.use_link(LoggerLink::new());
/// ```
pub struct Client<P, F = NoFlags> {
    pipeline: Pipeline,
    _state: PhantomData<fn() -> (P, F)>,
}

impl<P, F: FlagState> Client<P, F> {
    fn from_pipeline(pipeline: Pipeline) -> Self {
        debug_assert_eq!(pipeline.flags(), F::FLAGS);
        Self {
            pipeline,
            _state: PhantomData,
        }
    }

    pub fn flags(&self) -> FlagSet {
        F::FLAGS
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_flags(F::FLAGS)
    }

    /// Names of the attached links, in attachment order.
    pub fn link_names(&self) -> Vec<String> {
        self.pipeline.link_names()
    }

    /// The procedure set exposed by the last attached link.
    pub fn procedures(&self) -> &ProcedureSchema {
        self.pipeline.schema()
    }
}

impl<P: Procedures, S: Bool> Client<P, Flags<No, No, S>> {
    /// Attach `link` as the next stage.
    pub fn use_link<L>(&self, link: L) -> Client<L::Output, JoinFlags<Flags<No, No, S>, L::Flag>>
    where
        L: Link<P>,
    {
        Client::from_pipeline(self.pipeline.attach(into_dyn::<P, L>(link)))
    }

    /// Finalize the pipeline. No further links may be attached.
    pub fn build<Sub: Bool>(
        &self,
        options: BuildOptions<Sub>,
    ) -> Client<P, BuiltFlags<Flags<No, No, S>, Sub>> {
        Client::from_pipeline(self.pipeline.finalize(options.settings()))
    }
}

impl<P: Procedures, F: Operational> Client<P, F> {
    /// Run the query `key` and deserialize its response.
    ///
    /// Fails with [`Error::UnknownProcedure`](crate::Error::UnknownProcedure)
    /// before any link runs if `key` is not a query of the current
    /// procedure set. Dropping the returned future cancels the operation.
    pub fn query<O>(
        &self,
        key: &str,
        input: impl Serialize,
    ) -> impl Future<Output = Result<O>> + Send + 'static
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.pipeline
            .request(ProcedureKind::Query, key, encode(key, &input), None)
    }

    /// Like [`query`](Self::query), cancelled when `cancel` is.
    pub fn query_with_cancel<O>(
        &self,
        key: &str,
        input: impl Serialize,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<O>> + Send + 'static
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.pipeline.request(
            ProcedureKind::Query,
            key,
            encode(key, &input),
            Some(cancel.clone()),
        )
    }

    pub fn mutate<O>(
        &self,
        key: &str,
        input: impl Serialize,
    ) -> impl Future<Output = Result<O>> + Send + 'static
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.pipeline
            .request(ProcedureKind::Mutation, key, encode(key, &input), None)
    }

    pub fn mutate_with_cancel<O>(
        &self,
        key: &str,
        input: impl Serialize,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<O>> + Send + 'static
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.pipeline.request(
            ProcedureKind::Mutation,
            key,
            encode(key, &input),
            Some(cancel.clone()),
        )
    }

    /// Cache key for the query `key` with `input`.
    pub fn query_key(&self, key: &str, input: impl Serialize) -> Result<QueryKey> {
        self.pipeline.query_key(key, encode(key, &input))
    }
}

impl<P: Procedures, B: Bool, T: Bool> Client<P, Flags<B, T, No>>
where
    Flags<B, T, No>: Operational,
{
    /// Open the subscription `key`.
    pub fn subscribe<O>(&self, key: &str, input: impl Serialize) -> Result<Subscription<O>>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.pipeline.subscribe(key, encode(key, &input), None)
    }

    pub fn subscribe_with_cancel<O>(
        &self,
        key: &str,
        input: impl Serialize,
        cancel: &CancellationToken,
    ) -> Result<Subscription<O>>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.pipeline
            .subscribe(key, encode(key, &input), Some(cancel))
    }
}

impl<P, F> Clone for Client<P, F> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            _state: PhantomData,
        }
    }
}

impl<P, F: FlagState> fmt::Debug for Client<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("flags", &F::FLAGS)
            .field("links", &self.pipeline.link_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Error, LinkError};
    use crate::flags::{Flag, Passthrough, SubscriptionsUnsupported, Yes};
    use crate::link::{FnLink, LinkResponse, LoggerLink, Next, Operation};
    use futures::StreamExt;
    use serde_json::{json, Value};

    struct Api;

    impl Procedures for Api {
        fn schema() -> ProcedureSchema {
            ProcedureSchema::new()
                .query("version", "()", "String")
                .mutation("echo", "Value", "Value")
                .subscription("ticks", "()", "u32")
        }
    }

    struct Degrade;

    impl<P: Procedures> Link<P> for Degrade {
        type Output = P;
        type Flag = SubscriptionsUnsupported;

        fn name(&self) -> &str {
            "degrade"
        }

        fn call(&self, op: Operation, next: Next) -> LinkResponse {
            next.run(op)
        }
    }

    fn transport() -> FnLink<impl Fn(Operation) -> LinkResponse + Send + Sync + 'static> {
        FnLink::new("transport", |op: Operation| match op.key.as_str() {
            "version" => LinkResponse::value(json!("1.0.0")),
            "ticks" => LinkResponse::from_stream(futures::stream::iter(
                (1..=3).map(|n| Ok(json!(n))),
            )),
            _ => LinkResponse::value(op.input),
        })
    }

    #[test]
    fn test_init_is_open() {
        let client = init::<Api>(InitOptions::new());
        assert_eq!(client.state(), ClientState::Open);
        assert_eq!(client.procedures().len(), 3);
    }

    #[test]
    fn test_use_link_is_pure() {
        let client = init::<Api>(InitOptions::new());
        let a = client.use_link(LoggerLink::new());
        let b = client.use_link(Degrade);

        assert!(client.link_names().is_empty());
        assert_eq!(client.flags(), FlagSet::EMPTY);
        assert_eq!(a.link_names(), vec!["logger"]);
        assert_eq!(b.flags(), FlagSet::from(Flag::SubscriptionsUnsupported));
        assert_eq!(b.state(), ClientState::Open);
    }

    #[test]
    fn test_build_twice_from_same_value() {
        let client = init::<Api>(InitOptions::new());
        let with = client.build(BuildOptions::new().supports_subscriptions(Yes));
        let without = client.build(BuildOptions::new().supports_subscriptions(No));

        assert_eq!(with.flags(), FlagSet::from(Flag::Built));
        assert_eq!(without.flags(), FlagSet::from_bools(true, false, true));
        assert_eq!(client.state(), ClientState::Open);
    }

    #[test]
    fn test_terminated_state() {
        let client = init::<Api>(InitOptions::new()).use_link(transport());
        assert_eq!(client.state(), ClientState::Terminated);
        assert_eq!(client.flags(), FlagSet::from(Flag::TerminatedLink));
    }

    #[tokio::test]
    async fn test_query_and_mutate_after_terminal_link() {
        let client = init::<Api>(InitOptions::new())
            .use_link(LoggerLink::new())
            .use_link(transport());

        let version: String = client.query("version", ()).await.unwrap();
        assert_eq!(version, "1.0.0");

        let echoed: Value = client.mutate("echo", json!({"x": 1})).await.unwrap();
        assert_eq!(echoed, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_subscribe_after_terminal_link() {
        let client = init::<Api>(InitOptions::new()).use_link(transport());
        let ticks: Vec<u32> = client
            .subscribe::<u32>("ticks", ())
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(ticks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_query_rejects_mutation_key() {
        let client = init::<Api>(InitOptions::new()).use_link(transport());
        let err = client.query::<Value>("echo", ()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownProcedure {
                kind: ProcedureKind::Query,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_built_without_terminal_link_reports_chain_end() {
        let client = init::<Api>(InitOptions::new())
            .use_link(LoggerLink::new())
            .build(BuildOptions::new());
        let err = client.query::<String>("version", ()).await.unwrap_err();
        let link_err = err.as_link_error().unwrap();
        assert_eq!(link_err.stage(), Some("<end of chain>"));
        assert_eq!(link_err.position(), Some(1));
    }

    #[tokio::test]
    async fn test_subscribe_on_built_client() {
        let client = init::<Api>(InitOptions::new())
            .use_link(LoggerLink::new())
            .build(BuildOptions::new());
        assert_eq!(client.state(), ClientState::Built);

        let items: Vec<_> = client.subscribe::<u32>("ticks", ()).unwrap().collect().await;
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        let link_err = err.as_link_error().unwrap();
        assert_eq!(link_err.stage(), Some("<end of chain>"));
        assert_eq!(link_err.position(), Some(1));
    }

    #[tokio::test]
    async fn test_link_error_reaches_caller_unchanged() {
        let client = init::<Api>(InitOptions::new()).use_link(FnLink::new("down", |_| {
            LinkResponse::error(LinkError::new("connection refused"))
        }));
        let err = client.query::<String>("version", ()).await.unwrap_err();
        assert_eq!(err.as_link_error().unwrap().message(), "connection refused");
    }

    #[test]
    fn test_query_key() {
        let client = init::<Api>(InitOptions::new()).use_link(transport());
        let key = client.query_key("version", ()).unwrap();
        assert_eq!(key.as_slice(), &[json!("version")]);
        assert!(client.query_key("echo", ()).is_err());
    }

    #[test]
    fn test_projection_changes_procedure_set() {
        struct Public;

        impl Procedures for Public {
            fn schema() -> ProcedureSchema {
                ProcedureSchema::new().query("version", "()", "String")
            }
        }

        struct OnlyPublic;

        impl Link<Api> for OnlyPublic {
            type Output = Public;
            type Flag = Passthrough;

            fn call(&self, op: Operation, next: Next) -> LinkResponse {
                next.run(op)
            }
        }

        let client = init::<Api>(InitOptions::new()).use_link(OnlyPublic);
        assert_eq!(client.procedures().len(), 1);
        assert!(client.procedures().get("echo").is_none());
    }

    #[test]
    fn test_debug_output() {
        let client = init::<Api>(InitOptions::new()).use_link(LoggerLink::new());
        assert_eq!(
            format!("{:?}", client),
            "Client { state: Open, flags: {}, links: [\"logger\"] }"
        );
    }
}

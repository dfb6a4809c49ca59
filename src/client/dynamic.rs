//! Runtime-checked client.
//!
//! [`DynClient`] enforces the same composition rules as [`Client`](crate::Client),
//! but against flags known only at runtime: links described by a
//! configuration file, or chosen by the caller while the program runs.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{BuildSettings, InitOptions, Subscription};
use crate::config::{ClientConfig, LinkRegistry};
use crate::errors::{ComposeError, Result};
use crate::flags::{check_attach, check_build, ClientState, Flag, FlagSet};
use crate::link::DynLink;
use crate::pipeline::{encode, Pipeline, QueryKey};
use crate::procedures::{ProcedureKind, ProcedureSchema};

/// A client pipeline whose flags are checked when links are attached.
#[derive(Debug, Clone)]
pub struct DynClient {
    pipeline: Pipeline,
}

impl DynClient {
    pub fn new(schema: ProcedureSchema, options: InitOptions) -> Self {
        Self {
            pipeline: Pipeline::new(Arc::new(schema), options),
        }
    }

    /// Build a client from a parsed configuration, attaching its links in
    /// order and then applying its `[build]` section, if any.
    ///
    /// ```
    /// use rspc_client::config::{parse_config, LinkRegistry};
    /// use rspc_client::{ClientState, DynClient, InitOptions, ProcedureSchema};
    ///
    /// let config = parse_config(
    ///     r#"
    ///     [[links]]
    ///     name = "logger"
    ///
    ///     [build]
    ///     supports_subscriptions = false
    ///     "#,
    /// )
    /// .unwrap();
    /// let client = DynClient::from_config(
    ///     ProcedureSchema::new(),
    ///     &config,
    ///     &LinkRegistry::with_defaults(),
    ///     InitOptions::new(),
    /// )
    /// .unwrap();
    /// assert_eq!(client.state(), ClientState::Built);
    /// ```
    pub fn from_config(
        schema: ProcedureSchema,
        config: &ClientConfig,
        registry: &LinkRegistry,
        options: InitOptions,
    ) -> Result<Self> {
        let mut client = Self::new(schema, options);
        for spec in &config.links {
            let link = registry.build_link(spec)?;
            client = client.use_link(link)?;
        }
        if let Some(settings) = config.build {
            client = client.build(settings)?;
        }
        Ok(client)
    }

    pub fn flags(&self) -> FlagSet {
        self.pipeline.flags()
    }

    pub fn state(&self) -> ClientState {
        self.pipeline.state()
    }

    pub fn link_names(&self) -> Vec<String> {
        self.pipeline.link_names()
    }

    pub fn procedures(&self) -> &ProcedureSchema {
        self.pipeline.schema()
    }

    /// Attach `link` as the next stage, if the current flags allow it.
    pub fn use_link(&self, link: Arc<dyn DynLink>) -> Result<Self, ComposeError> {
        if let Err(err) = check_attach(self.flags(), link.flags(), link.name()) {
            log::warn!("rejected link `{}`: {}", link.name(), err);
            return Err(err);
        }
        Ok(Self {
            pipeline: self.pipeline.attach(link),
        })
    }

    pub fn build(&self, settings: impl Into<BuildSettings>) -> Result<Self, ComposeError> {
        if let Err(err) = check_build(self.flags()) {
            log::warn!("rejected build: {}", err);
            return Err(err);
        }
        Ok(Self {
            pipeline: self.pipeline.finalize(settings.into()),
        })
    }

    fn ready(&self, operation: ProcedureKind) -> Result<()> {
        if self.state().is_operational() {
            Ok(())
        } else {
            Err(self
                .pipeline
                .report(ComposeError::NotReady { operation }.into()))
        }
    }

    pub async fn query<O>(&self, key: &str, input: impl Serialize) -> Result<O>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.run(ProcedureKind::Query, key, encode(key, &input), None)
            .await
    }

    pub async fn query_with_cancel<O>(
        &self,
        key: &str,
        input: impl Serialize,
        cancel: &CancellationToken,
    ) -> Result<O>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.run(ProcedureKind::Query, key, encode(key, &input), Some(cancel))
            .await
    }

    pub async fn mutate<O>(&self, key: &str, input: impl Serialize) -> Result<O>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.run(ProcedureKind::Mutation, key, encode(key, &input), None)
            .await
    }

    pub async fn mutate_with_cancel<O>(
        &self,
        key: &str,
        input: impl Serialize,
        cancel: &CancellationToken,
    ) -> Result<O>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.run(ProcedureKind::Mutation, key, encode(key, &input), Some(cancel))
            .await
    }

    async fn run<O>(
        &self,
        kind: ProcedureKind,
        key: &str,
        input: Result<serde_json::Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<O>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.ready(kind)?;
        self.pipeline
            .request(kind, key, input, cancel.cloned())
            .await
    }

    pub fn subscribe<O>(&self, key: &str, input: impl Serialize) -> Result<Subscription<O>>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.open(key, encode(key, &input), None)
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
        self.open(key, encode(key, &input), Some(cancel))
    }

    fn open<O>(
        &self,
        key: &str,
        input: Result<serde_json::Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Subscription<O>>
    where
        O: DeserializeOwned + Send + 'static,
    {
        self.ready(ProcedureKind::Subscription)?;
        if self.flags().contains(Flag::SubscriptionsUnsupported) {
            return Err(self
                .pipeline
                .report(ComposeError::SubscriptionsUnsupported.into()));
        }
        self.pipeline.subscribe(key, input, cancel)
    }

    pub fn query_key(&self, key: &str, input: impl Serialize) -> Result<QueryKey> {
        self.ready(ProcedureKind::Query)?;
        self.pipeline.query_key(key, encode(key, &input))
    }
}

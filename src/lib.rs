//! Type-state client pipelines for typed RPC procedures.
//!
//! A client starts open with [`init`], gains stages with
//! [`Client::use_link`], and becomes usable once it is terminated by a link
//! that answers operations itself, or finalized with [`Client::build`].
//! Which of `use_link`, `build`, `query`, `mutate` and `subscribe` exist is
//! decided by the flags carried in the client's type.
//!
//! ```
//! use rspc_client::flags::No;
//! use rspc_client::link::{FnLink, LinkResponse, LoggerLink};
//! use rspc_client::{init, BuildOptions, InitOptions};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rspc_client::Result<()> {
//! let client = init::<()>(InitOptions::new())
//!     .use_link(LoggerLink::new())
//!     .use_link(FnLink::without_subscriptions("http", |_| {
//!         LinkResponse::value(json!("pong"))
//!     }));
//!
//! // `()` exposes no procedures, so every key is rejected before any link runs.
//! assert!(client.query::<String>("ping", ()).await.is_err());
//!
//! let built = init::<()>(InitOptions::new())
//!     .use_link(LoggerLink::new())
//!     .build(BuildOptions::new().supports_subscriptions(No));
//! assert_eq!(built.link_names(), vec!["logger"]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod flags;
pub mod link;
pub mod pipeline;
pub mod procedures;

// Re-export commonly used types
pub use crate::client::{
    init, BuildOptions, BuildSettings, Client, DynClient, InitOptions, Subscription,
};

pub use crate::config::{load_config, parse_config, ClientConfig, LinkRegistry, LinkSpec};

pub use crate::errors::{ComposeError, Error, LinkError, Result};

pub use crate::flags::{ClientState, Flag, FlagSet};

pub use crate::link::{DynLink, Link, LinkResponse, Next, Operation};

pub use crate::pipeline::QueryKey;

pub use crate::procedures::{ProcedureDef, ProcedureKind, ProcedureSchema, Procedures};

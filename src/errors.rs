//! Error types for pipeline composition and operation execution.
//!
//! Three kinds of failure exist:
//!
//! - [`ComposeError`]: the pipeline was assembled illegally. The typed
//!   [`Client`](crate::Client) makes these unrepresentable; the runtime
//!   [`DynClient`](crate::DynClient) reports them as soon as the offending
//!   `use_link`/`build` call is made.
//! - [`Error::UnknownProcedure`]: an operation named a key the current
//!   procedure set does not declare. Raised before any link runs.
//! - [`LinkError`]: a link failed while handling an operation. The core
//!   never retries; it records which stage raised the error and hands it to
//!   the caller unchanged.
//!
//! Everything a caller of `query`/`mutate`/`subscribe` can observe is folded
//! into the single [`Error`] type.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::procedures::ProcedureKind;

/// A pipeline was composed in a way its flags do not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("cannot attach link `{link}` after a terminating link")]
    AfterTerminated { link: String },

    #[error(
        "link `{link}` does not support subscriptions but the pipeline was built with subscription support"
    )]
    SubscriptionsRequired { link: String },

    #[error("cannot attach link `{link}` to a built pipeline")]
    AfterBuilt { link: String },

    #[error("pipeline is already built")]
    AlreadyBuilt,

    #[error("cannot build a pipeline that ends in a terminating link")]
    BuildAfterTerminated,

    #[error("cannot run {operation}: pipeline is neither built nor terminated")]
    NotReady { operation: ProcedureKind },

    #[error("pipeline does not support subscriptions")]
    SubscriptionsUnsupported,
}

/// An error raised by a link while handling an operation.
///
/// Links create these with [`LinkError::new`] or [`LinkError::from_source`];
/// the stage name and position are filled in by the pipeline as the error
/// leaves the stage that raised it. Errors forwarded from further down the
/// chain keep their original attribution.
#[derive(Debug, Clone)]
pub struct LinkError {
    message: String,
    stage: Option<String>,
    position: Option<usize>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl LinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage: None,
            position: None,
            source: None,
        }
    }

    /// Wrap an underlying error, using its display text as the message.
    pub fn from_source<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: source.to_string(),
            stage: None,
            position: None,
            source: Some(Arc::new(source)),
        }
    }

    /// Raised when an operation runs past the last link without any link
    /// answering it.
    pub(crate) fn unhandled(key: &str, chain_len: usize) -> Self {
        Self {
            message: format!("no terminating link handled `{}`", key),
            stage: Some("<end of chain>".to_string()),
            position: Some(chain_len),
            source: None,
        }
    }

    /// Record the stage that raised this error, unless one is already set.
    #[must_use]
    pub fn attribute(mut self, stage: &str, position: usize) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage.to_string());
            self.position = Some(position);
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the link that raised the error.
    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    /// Zero-based attachment position of the link that raised the error.
    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.stage, self.position) {
            (Some(stage), Some(position)) => {
                write!(f, "link `{}` (#{}) failed: {}", stage, position, self.message)
            }
            (Some(stage), None) => write!(f, "link `{}` failed: {}", stage, self.message),
            _ => write!(f, "link failed: {}", self.message),
        }
    }
}

impl StdError for LinkError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

/// Unified error type surfaced to callers.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Illegal pipeline composition
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// The key is not a procedure of the requested kind
    #[error("unknown {kind} procedure `{key}`")]
    UnknownProcedure { kind: ProcedureKind, key: String },

    /// A link failed
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("failed to serialize input for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("failed to deserialize response for `{key}`: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// The pipeline finished without producing a value
    #[error("`{key}` completed without a response")]
    NoResponse { key: String },

    #[error("`{key}` was cancelled")]
    Cancelled { key: String },

    /// Configuration file errors
    #[error("configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// A configured link name has no registered factory
    #[error("no link registered under `{0}`")]
    UnknownLink(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    pub fn config_with_path(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Error category name, for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Compose(_) => "Compose",
            Self::UnknownProcedure { .. } => "UnknownProcedure",
            Self::Link(_) => "Link",
            Self::Serialize { .. } | Self::Deserialize { .. } => "Serialization",
            Self::NoResponse { .. } => "NoResponse",
            Self::Cancelled { .. } => "Cancelled",
            Self::Config { .. } | Self::UnknownLink(_) => "Config",
        }
    }

    /// The link error, if a link raised this failure.
    pub fn as_link_error(&self) -> Option<&LinkError> {
        match self {
            Self::Link(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias using our error type
pub type Result<T, E = Error> = std::result::Result<T, E>;

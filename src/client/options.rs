//! Options accepted by `init` and `build`.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::flags::{Bool, Yes};

type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Options for [`init`](crate::init) and [`DynClient::new`](crate::DynClient::new).
#[derive(Clone, Default)]
pub struct InitOptions {
    on_error: Option<ErrorHook>,
}

impl InitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `hook` with every error returned from `query`, `mutate` or
    /// `subscribe`, before it reaches the caller.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn notify(&self, error: &Error) {
        if let Some(hook) = &self.on_error {
            hook(error);
        }
    }
}

impl fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitOptions")
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Typed options for [`Client::build`](crate::Client::build).
///
/// Whether subscriptions stay supported is part of the type, so the built
/// client only exposes `subscribe` when they do:
///
/// ```
/// use rspc_client::flags::No;
/// use rspc_client::BuildOptions;
///
/// let with_subscriptions = BuildOptions::new();
/// let without = BuildOptions::new().supports_subscriptions(No);
/// assert!(with_subscriptions.settings().supports_subscriptions);
/// assert!(!without.settings().supports_subscriptions);
/// ```
pub struct BuildOptions<S = Yes> {
    _supports_subscriptions: PhantomData<fn() -> S>,
}

impl BuildOptions<Yes> {
    pub fn new() -> Self {
        Self {
            _supports_subscriptions: PhantomData,
        }
    }
}

impl Default for BuildOptions<Yes> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Bool> BuildOptions<S> {
    /// Pass [`Yes`] or [`No`](crate::flags::No).
    pub fn supports_subscriptions<T: Bool>(self, _supports: T) -> BuildOptions<T> {
        BuildOptions {
            _supports_subscriptions: PhantomData,
        }
    }

    pub fn settings(&self) -> BuildSettings {
        BuildSettings {
            supports_subscriptions: S::VALUE,
        }
    }
}

impl<S: Bool> fmt::Debug for BuildOptions<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("supports_subscriptions", &S::VALUE)
            .finish()
    }
}

/// Runtime build options, used by [`DynClient`](crate::DynClient) and the
/// `[build]` section of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_supports_subscriptions")]
    pub supports_subscriptions: bool,
}

fn default_supports_subscriptions() -> bool {
    true
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            supports_subscriptions: default_supports_subscriptions(),
        }
    }
}

impl<S: Bool> From<BuildOptions<S>> for BuildSettings {
    fn from(options: BuildOptions<S>) -> Self {
        options.settings()
    }
}

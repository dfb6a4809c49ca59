use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::LinkSpec;
use crate::errors::{Error, Result};
use crate::link::{into_dyn, DynLink, LoggerLink};

/// Builds a link from the options of its `[[links]]` entry.
pub type LinkFactory = Arc<dyn Fn(&LinkSpec) -> Result<Arc<dyn DynLink>> + Send + Sync>;

/// Maps link names used in configuration files to factories.
#[derive(Clone, Default)]
pub struct LinkRegistry {
    factories: BTreeMap<String, LinkFactory>,
}

impl LinkRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the stock `logger` link.
    ///
    /// `logger` accepts an optional `level` (`"error"` through `"trace"`).
    pub fn with_defaults() -> Self {
        Self::new().register("logger", |spec| {
            let link = match spec.str_option("level") {
                Some(level) => {
                    let level = log::Level::from_str(level).map_err(|_| {
                        Error::config(format!("invalid log level `{}` for link `logger`", level))
                    })?;
                    LoggerLink::new().with_level(level)
                }
                None => LoggerLink::new(),
            };
            Ok(into_dyn::<(), _>(link))
        })
    }

    /// Register `factory` under `name`, replacing any previous factory.
    #[must_use]
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&LinkSpec) -> Result<Arc<dyn DynLink>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            log::debug!("replacing link factory `{}`", name);
        }
        self.factories.insert(name, Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the link described by `spec`.
    pub fn build_link(&self, spec: &LinkSpec) -> Result<Arc<dyn DynLink>> {
        let factory = self
            .factories
            .get(&spec.name)
            .ok_or_else(|| Error::UnknownLink(spec.name.clone()))?;
        factory(spec)
    }
}

impl fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

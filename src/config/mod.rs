//! Pipeline configuration files.
//!
//! A configuration lists links by name, in attachment order, and optionally
//! how to build the pipeline:
//!
//! ```toml
//! [[links]]
//! name = "logger"
//! level = "info"
//!
//! [build]
//! supports_subscriptions = false
//! ```
//!
//! Every key of a `[[links]]` entry other than `name` is handed to the
//! link's factory in the [`LinkRegistry`].

mod loader;
mod registry;

use serde::{Deserialize, Serialize};

use crate::client::BuildSettings;

pub use loader::{directory_ancestors, discover_config, load_config, parse_config, CONFIG_FILE_NAME};
pub use registry::{LinkFactory, LinkRegistry};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub build: Option<BuildSettings>,
}

/// One `[[links]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub name: String,
    #[serde(flatten)]
    pub options: toml::Table,
}

impl LinkSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: toml::Table::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// String option `key`, if present and a string.
    pub fn str_option(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(toml::Value::as_str)
    }
}

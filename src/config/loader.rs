use std::fs;
use std::path::{Path, PathBuf};

use super::ClientConfig;
use crate::errors::{Error, Result};

/// File name searched for by [`discover_config`].
pub const CONFIG_FILE_NAME: &str = ".rspc.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Parse a configuration document.
pub fn parse_config(contents: &str) -> Result<ClientConfig> {
    let config = toml::from_str::<ClientConfig>(contents)
        .map_err(|e| Error::config(format!("failed to parse client config: {}", e)))?;

    if config.links.iter().any(|spec| spec.name.trim().is_empty()) {
        return Err(Error::config("link entry with an empty name"));
    }
    Ok(config)
}

/// Read and parse the configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::config_with_path(format!("failed to read config: {}", e), path))?;

    let config = parse_config(&contents).map_err(|err| match err {
        Error::Config { message, .. } => Error::config_with_path(message, path),
        other => other,
    })?;
    log::debug!(
        "loaded client config from {} ({} link(s))",
        path.display(),
        config.links.len()
    );
    Ok(config)
}

/// `start` followed by its parents, at most `max_depth` directories.
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Search `start` and its ancestors for [`CONFIG_FILE_NAME`].
///
/// Returns `Ok(None)` when no file exists. A file that exists but cannot
/// be read or parsed is an error.
pub fn discover_config(start: impl Into<PathBuf>) -> Result<Option<(PathBuf, ClientConfig)>> {
    let found = directory_ancestors(start.into(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.is_file());

    match found {
        Some(path) => {
            let config = load_config(&path)?;
            Ok(Some((path, config)))
        }
        None => {
            log::debug!(
                "no {} found after checking {} directories",
                CONFIG_FILE_NAME,
                MAX_TRAVERSAL_DEPTH
            );
            Ok(None)
        }
    }
}

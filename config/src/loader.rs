//! TOML loading for the workspace model and driver settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::settings::DriverSettings;
use crate::workspace::Workspace;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_workspace(path: &Path) -> Result<Workspace, ConfigError> {
    debug!(path = %path.display(), "Loading workspace model");
    load(path)
}

pub fn load_settings(path: &Path) -> Result<DriverSettings, ConfigError> {
    debug!(path = %path.display(), "Loading driver settings");
    load(path)
}

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::EchopostConfig,
};

/// Standard config file name.
const CONFIG_FILENAME: &str = "echopost.toml";

/// Load, substitute env placeholders, parse, and normalize a config file.
pub fn load_config(path: &Path) -> Result<EchopostConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    let mut config: EchopostConfig = toml::from_str(&raw).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.normalize();
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./echopost.toml` (project-local)
/// 2. `~/.config/echopost/echopost.toml` (user-global)
///
/// Falls back to defaults when no file exists; validation then reports the
/// missing required fields.
pub fn discover_and_load() -> Result<EchopostConfig> {
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(EchopostConfig::default())
        },
    }
}

/// Find the first config file in standard locations.
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(dir) = config_dir() {
        let global = dir.join(CONFIG_FILENAME);
        if global.exists() {
            return Some(global);
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/echopost/`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "echopost").map(|d| d.config_dir().to_path_buf())
}

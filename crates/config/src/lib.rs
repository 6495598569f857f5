//! Configuration loading, env substitution, and validation.
//!
//! Config file: `echopost.toml`, searched in `./` then
//! `~/.config/echopost/`. Supports `${ENV_VAR}` substitution in all string
//! values. Validation failures are fatal at startup; nothing here is
//! recoverable at runtime.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{EchopostConfig, MonitorSection, TelegramSection},
};

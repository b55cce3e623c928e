//! Configuration file handling for vcdtool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use vcdtool_core::{Error, VcdConfig};

/// Connection settings given on the command line or through the environment.
#[derive(Debug, Default)]
pub struct ConnectionArgs<'a> {
    pub api_url: Option<&'a str>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub insecure: bool,
}

/// Load configuration from the default config file, if it exists.
pub fn load() -> Result<VcdConfig> {
    let config_path = config_path()?;
    if config_path.exists() {
        load_from(&config_path)
    } else {
        Ok(VcdConfig::default())
    }
}

/// Load configuration from a specific path.
///
/// A missing file is a configuration error, not a missing upload input.
pub fn load_from(path: &Path) -> Result<VcdConfig> {
    VcdConfig::from_file(path)
        .map_err(|e| {
            if e.is_file_not_found() {
                Error::config(format!("config file '{}' does not exist", path.display()))
            } else {
                e
            }
        })
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}

/// Get the default config file path.
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("vcdtool");

    Ok(config_dir.join("config.toml"))
}

/// Overlay command line values on the file configuration.
pub fn merge_with_args(mut config: VcdConfig, args: &ConnectionArgs<'_>) -> VcdConfig {
    let connection = &mut config.connection;
    if let Some(api_url) = args.api_url {
        connection.api_url = api_url.to_string();
    }
    if let Some(username) = args.username {
        connection.username = username.to_string();
    }
    if let Some(password) = args.password {
        connection.password = password.to_string();
    }
    if args.insecure {
        connection.verify_tls = false;
    }
    config
}

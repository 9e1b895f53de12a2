//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::error::{Result, ServerError};

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig =
        toml::from_str(&content).map_err(|e| ServerError::Config(e.to_string()))?;
    Ok(config)
}

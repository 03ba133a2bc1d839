use std::path::{Path, PathBuf};

use crate::error::OpaiError;

use super::env::expand_config;
use super::types::OpaiConfig;

pub const CONFIG_ENV_VAR: &str = "OPAITOKENS_CONFIG";

/// Where the config would live under the user's home directory.
pub fn home_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".opaitokens").join("config.json"))
}

/// Pick the config file to load.
///
/// Precedence:
/// 1. `--config` CLI flag
/// 2. `OPAITOKENS_CONFIG` env var
/// 3. `~/.opaitokens/config.json`
///
/// The boolean reports whether the path was asked for explicitly; an
/// explicit path that does not exist is an error, the home file is optional.
pub fn resolve_config_path(cli_config: Option<&str>) -> Option<(PathBuf, bool)> {
    if let Some(path) = cli_config {
        return Some((PathBuf::from(path), true));
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some((PathBuf::from(path), true));
        }
    }
    home_config_path().map(|p| (p, false))
}

pub fn load_config_file(path: &Path) -> Result<OpaiConfig, OpaiError> {
    let content = std::fs::read_to_string(path).map_err(|e| OpaiError::ConfigError {
        path: path.to_path_buf(),
        detail: format!("Cannot read file: {e}"),
    })?;

    let mut config: OpaiConfig =
        serde_json::from_str(&content).map_err(|e| OpaiError::ConfigError {
            path: path.to_path_buf(),
            detail: format!("Invalid JSON: {e}"),
        })?;

    expand_config(&mut config).map_err(|e| match e {
        OpaiError::ConfigError { detail, .. } => OpaiError::ConfigError {
            path: path.to_path_buf(),
            detail,
        },
        other => other,
    })?;
    Ok(config)
}

/// Load the config, falling back to defaults when no file is present.
pub fn load_config(cli_config: Option<&str>) -> Result<OpaiConfig, OpaiError> {
    match resolve_config_path(cli_config) {
        Some((path, explicit)) if explicit || path.exists() => {
            tracing::debug!(path = %path.display(), "loading config");
            load_config_file(&path)
        }
        _ => Ok(OpaiConfig::default()),
    }
}

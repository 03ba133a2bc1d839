use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::OpaiError;

use super::types::OpaiConfig;

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("variable pattern is a valid regex")
});

/// Expand `${VAR}` and `${VAR:-fallback}` references.
///
/// The fallback is used when the variable is unset or empty. An unset
/// variable without a fallback is an error.
pub fn expand_env_vars(input: &str) -> Result<String, OpaiError> {
    let mut missing = None;
    let expanded = VAR_RE.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        match (std::env::var(name), caps.get(2)) {
            (Ok(val), Some(fallback)) if val.is_empty() => fallback.as_str().to_string(),
            (Ok(val), _) => val,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(OpaiError::ConfigError {
            path: PathBuf::from("<env>"),
            detail: format!("Environment variable '{name}' is not set"),
        }),
        None => Ok(expanded.into_owned()),
    }
}

/// Expand environment references in every string field of the config.
pub fn expand_config(config: &mut OpaiConfig) -> Result<(), OpaiError> {
    config.auth_base_url = expand_env_vars(&config.auth_base_url)?;
    config.pool_base_url = expand_env_vars(&config.pool_base_url)?;
    if let Some(url) = config.discovery_base_url.as_mut() {
        *url = expand_env_vars(url)?;
    }
    if let Some(agent) = config.user_agent.as_mut() {
        *agent = expand_env_vars(agent)?;
    }
    if let Some(account) = config.account.as_mut() {
        account.email = expand_env_vars(&account.email)?;
        account.password = expand_env_vars(&account.password)?;
        if let Some(code) = account.mfa_code.as_mut() {
            *code = expand_env_vars(code)?;
        }
    }
    Ok(())
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::oauth::discovery::{Endpoints, AUTH_BASE_URL, BROWSER_USER_AGENT};
use crate::oauth::session::HttpSettings;
use crate::pool::POOL_BASE_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaiConfig {
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
    /// Replaces the date-derived `ai-<YYYYMMDD>.fakeopen.com` host.
    #[serde(default)]
    pub discovery_base_url: Option<String>,
    #[serde(default = "default_pool_base_url")]
    pub pool_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default)]
    pub account: Option<AccountConfig>,
}

fn default_auth_base_url() -> String {
    AUTH_BASE_URL.to_string()
}

fn default_pool_base_url() -> String {
    POOL_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    100
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Default for OpaiConfig {
    fn default() -> Self {
        Self {
            auth_base_url: default_auth_base_url(),
            discovery_base_url: None,
            pool_base_url: default_pool_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            accept_invalid_certs: default_accept_invalid_certs(),
            account: None,
        }
    }
}

impl OpaiConfig {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            auth_base: self.auth_base_url.clone(),
            discovery_base: self.discovery_base_url.clone(),
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| BROWSER_USER_AGENT.to_string()),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub mfa_code: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("mfa_code", &self.mfa_code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

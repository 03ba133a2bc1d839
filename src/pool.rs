//! Client for the fakeopen token-sharing service.
//!
//! Share tokens wrap an access token under a stable name; pool tokens
//! bundle up to [`POOLED_TOKENS_LIMIT`] share tokens behind one key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::OpaiConfig;
use crate::error::OpaiError;
use crate::oauth::session::{build_client, request_failed, HttpSettings, RedirectPolicy};

pub const POOL_BASE_URL: &str = "https://ai.fakeopen.com";
pub const POOLED_TOKENS_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTokenRequest {
    pub unique_name: String,
    pub access_token: String,
    /// Seconds until the share token lapses; 0 inherits the access token's expiry.
    pub expires_in: i64,
    /// Domains allowed to use the token, empty for no restriction.
    pub site_limit: String,
    pub show_conversations: bool,
}

impl SharedTokenRequest {
    pub fn new(unique_name: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            access_token: access_token.into(),
            expires_in: 0,
            site_limit: String::new(),
            show_conversations: true,
        }
    }

    fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("unique_name", self.unique_name.clone()),
            ("access_token", self.access_token.clone()),
            ("expires_in", self.expires_in.to_string()),
            ("site_limit", self.site_limit.clone()),
            ("show_conversations", self.show_conversations.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedToken {
    pub expire_at: i64,
    pub show_conversations: bool,
    pub show_userinfo: bool,
    pub site_limit: String,
    pub token_key: String,
    pub unique_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PooledToken {
    pub count: u32,
    pub pool_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToken {
    pub access_token: String,
    pub expires_in: i64,
    pub session_token: String,
    pub token_type: String,
}

/// Thin client over the pool service. Requests are not retried.
#[derive(Debug, Clone)]
pub struct TokenPoolClient {
    base_url: String,
    http: reqwest::Client,
}

impl TokenPoolClient {
    pub fn new() -> Result<Self, OpaiError> {
        Self::with_settings(POOL_BASE_URL, &HttpSettings::default())
    }

    pub fn from_config(config: &OpaiConfig) -> Result<Self, OpaiError> {
        Self::with_settings(&config.pool_base_url, &config.http_settings())
    }

    pub fn with_settings(base_url: &str, settings: &HttpSettings) -> Result<Self, OpaiError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: build_client(settings, RedirectPolicy::Follow, None)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register_shared_token(
        &self,
        req: &SharedTokenRequest,
    ) -> Result<SharedToken, OpaiError> {
        self.post_form("share token register", "/token/register", &req.form())
            .await
    }

    /// Revoke by re-registering the name with a zero lifetime.
    pub async fn revoke_shared_token(
        &self,
        unique_name: &str,
        access_token: &str,
    ) -> Result<SharedToken, OpaiError> {
        let req = SharedTokenRequest::new(unique_name, access_token);
        self.register_shared_token(&req).await
    }

    /// Create a pool token, or replace the members of `pool_token` when it is non-empty.
    pub async fn renew_pooled_token(
        &self,
        share_tokens: &[String],
        pool_token: &str,
    ) -> Result<PooledToken, OpaiError> {
        if share_tokens.is_empty() || share_tokens.len() > POOLED_TOKENS_LIMIT {
            return Err(OpaiError::InvalidInput(format!(
                "expected 1 to {POOLED_TOKENS_LIMIT} share tokens, got {}",
                share_tokens.len()
            )));
        }

        let form = vec![
            ("share_tokens", share_tokens.join("\n")),
            ("pool_token", pool_token.to_string()),
        ];
        self.post_form("pool token renew", "/pool/update", &form).await
    }

    pub async fn access_token_from_session_token(
        &self,
        session_token: &str,
    ) -> Result<SessionToken, OpaiError> {
        let form = vec![("session_token", session_token.to_string())];
        self.post_form("session token exchange", "/auth/session", &form)
            .await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        context: &str,
        path: &str,
        form: &[(&'static str, String)],
    ) -> Result<T, OpaiError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(context, url = %url, "posting to pool service");

        let resp = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| request_failed(context, e))?;
        let body = resp.text().await.map_err(|e| request_failed(context, e))?;

        serde_json::from_str(&body).map_err(|e| OpaiError::DecodeFailed {
            context: context.to_string(),
            detail: e.to_string(),
        })
    }
}

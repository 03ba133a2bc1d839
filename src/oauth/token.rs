use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OpaiError;
use crate::oauth::discovery::{CLIENT_ID, REDIRECT_URI};

/// Seconds subtracted from the provider-declared token lifetime.
pub const EXPIRY_MARGIN_SECS: i64 = 5 * 60;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of a flow run in auth-for-code mode.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code_verifier: String,
    pub code: String,
}

impl std::fmt::Display for AuthorizationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.code_verifier, self.code)
    }
}

/// Raw token response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
}

/// Interpret a token endpoint response observed at `issued_at`.
pub fn parse_token_response(
    context: &str,
    status: u16,
    body: &str,
    issued_at: DateTime<Utc>,
) -> Result<Credential, OpaiError> {
    if status != 200 {
        return Err(OpaiError::TokenExchangeFailed {
            status,
            body: truncate(body),
        });
    }

    let resp: TokenResponse = serde_json::from_str(body).map_err(|e| OpaiError::DecodeFailed {
        context: context.to_string(),
        detail: e.to_string(),
    })?;

    let access_token = match resp.access_token {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(OpaiError::TokenExchangeFailed {
                status,
                body: truncate(body),
            })
        }
    };

    let ttl = resp.expires_in.saturating_sub(EXPIRY_MARGIN_SECS);
    let expires_at = chrono::Duration::try_seconds(ttl)
        .and_then(|ttl| issued_at.checked_add_signed(ttl))
        .ok_or_else(|| OpaiError::DecodeFailed {
            context: context.to_string(),
            detail: format!("expires_in out of range: {}", resp.expires_in),
        })?;

    Ok(Credential {
        access_token,
        refresh_token: resp.refresh_token.unwrap_or_default(),
        expires_at,
    })
}

pub fn code_exchange_form(code: &str, code_verifier: &str) -> Vec<(&'static str, String)> {
    vec![
        ("redirect_uri", REDIRECT_URI.to_string()),
        ("grant_type", "authorization_code".to_string()),
        ("client_id", CLIENT_ID.to_string()),
        ("code", code.to_string()),
        ("code_verifier", code_verifier.to_string()),
    ]
}

pub fn refresh_form(refresh_token: &str) -> Vec<(&'static str, String)> {
    vec![
        ("redirect_uri", REDIRECT_URI.to_string()),
        ("grant_type", "refresh_token".to_string()),
        ("client_id", CLIENT_ID.to_string()),
        ("refresh_token", refresh_token.to_string()),
    ]
}

// Keeps error payloads readable when the provider answers with an HTML page.
fn truncate(body: &str) -> String {
    const LIMIT: usize = 512;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

pub const CLIENT_ID: &str = "pdlLIX2Y72MIl2rhLhTE9VV9bN905kBh";
pub const REDIRECT_URI: &str = "com.openai.chat://auth0.openai.com/ios/com.openai.chat/callback";
pub const AUTH_BASE_URL: &str = "https://auth0.openai.com";
pub const LOGIN_REFERER: &str = "https://ios.chat.openai.com/";
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

pub const RESUME_PREFIX: &str = "/authorize/resume?";
pub const MFA_CHALLENGE_PREFIX: &str = "/u/mfa-otp-challenge?";

const AUTHORIZE_QUERY_TEMPLATE: &str = "client_id=pdlLIX2Y72MIl2rhLhTE9VV9bN905kBh\
    &audience=https%3A%2F%2Fapi.openai.com%2Fv1\
    &redirect_uri=com.openai.chat%3A%2F%2Fauth0.openai.com%2Fios%2Fcom.openai.chat%2Fcallback\
    &scope=openid%20email%20profile%20offline_access%20model.request%20model.read%20organization.read%20offline\
    &response_type=code\
    &code_challenge={code_challenge}\
    &code_challenge_method=S256\
    &prompt=login\
    &preauth_cookie={preauth_cookie}";

/// Body of the discovery host's `/auth/preauth` endpoint.
#[derive(Debug, Deserialize)]
pub struct PreauthResponse {
    #[serde(default)]
    pub preauth_cookie: String,
}

/// Discovery host for a given day: `https://ai-<YYYYMMDD>.fakeopen.com`.
pub fn discovery_base_for(date: NaiveDate) -> String {
    format!("https://ai-{}.fakeopen.com", date.format("%Y%m%d"))
}

/// Discovery host derived from yesterday's UTC date.
pub fn default_discovery_base() -> String {
    let yesterday = (Utc::now() - chrono::Duration::days(1)).date_naive();
    discovery_base_for(yesterday)
}

/// Hosts the login flow talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth_base: String,
    /// Overrides the date-templated discovery host when set.
    pub discovery_base: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base: AUTH_BASE_URL.to_string(),
            discovery_base: None,
        }
    }
}

impl Endpoints {
    pub fn discovery_base(&self) -> String {
        match &self.discovery_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => default_discovery_base(),
        }
    }

    fn auth_base(&self) -> &str {
        self.auth_base.trim_end_matches('/')
    }

    pub fn preauth_url(&self) -> String {
        format!("{}/auth/preauth", self.discovery_base())
    }

    pub fn proxy_login_url(&self) -> String {
        format!("{}/auth/login", self.discovery_base())
    }

    pub fn authorize_url(&self, code_challenge: &str, preauth_cookie: &str) -> String {
        let cookie: String = url::form_urlencoded::byte_serialize(preauth_cookie.as_bytes()).collect();
        let query = AUTHORIZE_QUERY_TEMPLATE
            .replace("{code_challenge}", code_challenge)
            .replace("{preauth_cookie}", &cookie);
        format!("{}/authorize?{query}", self.auth_base())
    }

    pub fn identifier_url(&self, state: &str) -> String {
        format!("{}/u/login/identifier?state={}", self.auth_base(), encode(state))
    }

    pub fn password_url(&self, state: &str) -> String {
        format!("{}/u/login/password?state={}", self.auth_base(), encode(state))
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.auth_base())
    }

    pub fn origin(&self) -> &str {
        self.auth_base()
    }

    /// Resolve a provider-relative redirect such as `/authorize/resume?...`.
    pub fn absolute(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}{location}", self.auth_base())
        }
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// True when `location` points at the app's registered callback.
pub fn is_callback(location: &str) -> bool {
    location
        .strip_prefix(REDIRECT_URI)
        .is_some_and(|rest| rest.starts_with('?'))
}

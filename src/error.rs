use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OpaiError {
    #[error("Invalid email or password format")]
    InvalidCredentialsFormat,

    #[error("Preauth failed (status {status}): {detail}")]
    PreauthFailed { status: u16, detail: String },

    #[error("No state parameter found in login page URL {url}")]
    MissingAuthorizeState { url: String },

    #[error("Email was rejected by the identity provider (status {status})")]
    IdentifierRejected { status: u16 },

    #[error("Wrong email or password")]
    WrongCredentials,

    #[error("Wrong MFA code")]
    WrongMfaCode,

    #[error("Account requires an MFA code but none was supplied")]
    MfaRequired,

    #[error("{}", format_redirect("Login callback failed", .status, .location))]
    LoginCallbackFailed {
        status: u16,
        location: Option<String>,
    },

    #[error("{}", format_redirect("Login failed", .status, .location))]
    LoginFailed {
        status: u16,
        location: Option<String>,
    },

    #[error("Identity provider returned {code}: {description}")]
    ProviderError { code: String, description: String },

    #[error("Token exchange failed with status {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("Request failed during {context}: {source}")]
    RequestFailed {
        context: String,
        source: reqwest::Error,
    },

    #[error("Failed to decode response during {context}: {detail}")]
    DecodeFailed { context: String, detail: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Error in config {}: {detail}", path.display())]
    ConfigError { path: PathBuf, detail: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_redirect(prefix: &str, status: &u16, location: &Option<String>) -> String {
    match location {
        Some(loc) => format!("{prefix} (status {status}, redirect to {loc})"),
        None => format!("{prefix} (status {status})"),
    }
}

/// What a caller can sensibly do after a failed flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Transient or upstream drift; a fresh flow may succeed.
    Retry,
    /// Ask the user for a one-time code and start over.
    PromptMfa,
    /// Inputs are wrong; retrying with the same identity will fail again.
    Abort,
}

impl OpaiError {
    /// Error code string for structured JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            OpaiError::InvalidCredentialsFormat => "invalid_credentials_format",
            OpaiError::PreauthFailed { .. } => "preauth_failed",
            OpaiError::MissingAuthorizeState { .. } => "missing_authorize_state",
            OpaiError::IdentifierRejected { .. } => "identifier_rejected",
            OpaiError::WrongCredentials => "wrong_credentials",
            OpaiError::WrongMfaCode => "wrong_mfa_code",
            OpaiError::MfaRequired => "mfa_required",
            OpaiError::LoginCallbackFailed { .. } => "login_callback_failed",
            OpaiError::LoginFailed { .. } => "login_failed",
            OpaiError::ProviderError { .. } => "provider_error",
            OpaiError::TokenExchangeFailed { .. } => "token_exchange_failed",
            OpaiError::RequestFailed { .. } => "request_failed",
            OpaiError::DecodeFailed { .. } => "decode_failed",
            OpaiError::InvalidInput(_) => "invalid_input",
            OpaiError::ConfigError { .. } => "config_error",
            OpaiError::IoError(_) => "io_error",
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            OpaiError::MfaRequired | OpaiError::WrongMfaCode => Recovery::PromptMfa,
            OpaiError::InvalidCredentialsFormat
            | OpaiError::IdentifierRejected { .. }
            | OpaiError::WrongCredentials
            | OpaiError::ProviderError { .. }
            | OpaiError::InvalidInput(_)
            | OpaiError::ConfigError { .. } => Recovery::Abort,
            OpaiError::PreauthFailed { .. }
            | OpaiError::MissingAuthorizeState { .. }
            | OpaiError::LoginCallbackFailed { .. }
            | OpaiError::LoginFailed { .. }
            | OpaiError::TokenExchangeFailed { .. }
            | OpaiError::RequestFailed { .. }
            | OpaiError::DecodeFailed { .. }
            | OpaiError::IoError(_) => Recovery::Retry,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.recovery() == Recovery::Retry
    }

    pub fn needs_mfa(&self) -> bool {
        self.recovery() == Recovery::PromptMfa
    }

    /// HTTP status observed when the failure was classified, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            OpaiError::PreauthFailed { status, .. }
            | OpaiError::IdentifierRejected { status }
            | OpaiError::LoginCallbackFailed { status, .. }
            | OpaiError::LoginFailed { status, .. }
            | OpaiError::TokenExchangeFailed { status, .. } => Some(*status),
            OpaiError::RequestFailed { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("message".into(), serde_json::Value::String(self.to_string()));
        obj.insert("code".into(), serde_json::Value::String(self.code().to_string()));
        if let Some(status) = self.status() {
            obj.insert("status".into(), serde_json::Value::from(status));
        }
        if let OpaiError::ProviderError { code, description } = self {
            obj.insert("providerCode".into(), serde_json::Value::String(code.clone()));
            obj.insert(
                "providerDescription".into(),
                serde_json::Value::String(description.clone()),
            );
        }
        serde_json::json!({ "error": obj })
    }
}

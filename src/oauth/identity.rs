use std::sync::LazyLock;

use regex::Regex;

use crate::error::OpaiError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,7}\b")
        .expect("email pattern is a valid regex")
});

/// Account inputs for one login flow.
#[derive(Clone)]
pub struct Identity {
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            mfa_code: None,
        }
    }

    pub fn with_mfa_code(mut self, code: impl Into<String>) -> Self {
        let code = code.into();
        self.mfa_code = if code.is_empty() { None } else { Some(code) };
        self
    }

    /// Reject obviously malformed inputs before touching the network.
    pub fn validate(&self) -> Result<(), OpaiError> {
        if !EMAIL_RE.is_match(&self.email) || self.password.is_empty() {
            return Err(OpaiError::InvalidCredentialsFormat);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("mfa_code", &self.mfa_code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

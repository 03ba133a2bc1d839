pub mod cli;
pub mod config;
pub mod error;
pub mod oauth;
pub mod pool;

pub use config::{load_config, OpaiConfig};
pub use error::OpaiError;
pub use oauth::{AuthorizationCode, Authenticator, Credential, FlowMode, Identity, TokenCache};
pub use pool::TokenPoolClient;

/// One-shot convenience function: log in and return a fresh access token.
pub async fn login_once(email: &str, password: &str) -> Result<Credential, OpaiError> {
    let config = load_config(None)?;
    let mut auth = Authenticator::from_config(Identity::new(email, password), &config);
    auth.access_token(false).await
}

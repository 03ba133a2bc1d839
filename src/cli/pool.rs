use crate::config::load_config;
use crate::error::OpaiError;
use crate::pool::{SharedTokenRequest, TokenPoolClient};

use super::output::{print_result, OutputMode};

fn client(config_path: Option<&str>) -> Result<TokenPoolClient, OpaiError> {
    let config = load_config(config_path)?;
    TokenPoolClient::from_config(&config)
}

pub async fn run_share_register(
    config_path: Option<&str>,
    req: &SharedTokenRequest,
    mode: OutputMode,
) -> Result<(), OpaiError> {
    let token = client(config_path)?.register_shared_token(req).await?;
    print_result(&token, &token.token_key, mode);
    Ok(())
}

pub async fn run_share_revoke(
    config_path: Option<&str>,
    unique_name: &str,
    access_token: &str,
    mode: OutputMode,
) -> Result<(), OpaiError> {
    let token = client(config_path)?
        .revoke_shared_token(unique_name, access_token)
        .await?;
    print_result(&token, &token.token_key, mode);
    Ok(())
}

pub async fn run_pool_renew(
    config_path: Option<&str>,
    share_tokens: &[String],
    pool_token: &str,
    mode: OutputMode,
) -> Result<(), OpaiError> {
    let pooled = client(config_path)?
        .renew_pooled_token(share_tokens, pool_token)
        .await?;
    print_result(&pooled, &pooled.pool_token, mode);
    Ok(())
}

pub async fn run_session_exchange(
    config_path: Option<&str>,
    session_token: &str,
    mode: OutputMode,
) -> Result<(), OpaiError> {
    let token = client(config_path)?
        .access_token_from_session_token(session_token)
        .await?;
    print_result(&token, &token.access_token, mode);
    Ok(())
}

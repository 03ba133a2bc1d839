use crate::config::{load_config, OpaiConfig};
use crate::error::OpaiError;
use crate::oauth::{Authenticator, Identity};

use super::output::{print_result, OutputMode};

/// Account inputs as given on the command line; unset fields fall back to config.
#[derive(Debug, Default, Clone)]
pub struct AccountArgs {
    pub email: Option<String>,
    pub password: Option<String>,
    pub mfa_code: Option<String>,
}

/// Merge CLI account inputs over the config's `account` block.
pub fn resolve_identity(args: &AccountArgs, config: &OpaiConfig) -> Identity {
    fn pick(flag: &Option<String>, from_config: Option<&String>) -> String {
        flag.clone()
            .or_else(|| from_config.cloned())
            .unwrap_or_default()
    }

    let account = config.account.as_ref();
    let email = pick(&args.email, account.map(|a| &a.email));
    let password = pick(&args.password, account.map(|a| &a.password));
    let mfa_code = pick(
        &args.mfa_code,
        account.and_then(|a| a.mfa_code.as_ref()),
    );
    Identity::new(email, password).with_mfa_code(mfa_code)
}

pub async fn run_login(
    config_path: Option<&str>,
    args: &AccountArgs,
    code_only: bool,
    via_proxy: bool,
    mode: OutputMode,
) -> Result<(), OpaiError> {
    let config = load_config(config_path)?;
    let identity = resolve_identity(args, &config);
    let mut auth = Authenticator::from_config(identity, &config);

    if code_only {
        let code = auth.auth_for_code().await?;
        print_result(&code, &code.to_string(), mode);
        return Ok(());
    }

    let cred = if via_proxy {
        auth.authenticate_via_proxy(true).await?
    } else {
        auth.access_token(true).await?
    };
    print_result(&cred, &cred.access_token, mode);
    Ok(())
}

pub async fn run_refresh(
    config_path: Option<&str>,
    refresh_token: &str,
    mode: OutputMode,
) -> Result<(), OpaiError> {
    let config = load_config(config_path)?;
    let identity = resolve_identity(&AccountArgs::default(), &config);
    let mut auth = Authenticator::from_config(identity, &config);

    let cred = auth.refresh_access_token(refresh_token).await?;
    print_result(&cred, &cred.access_token, mode);
    Ok(())
}

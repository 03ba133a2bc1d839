use std::io::IsTerminal;

use clap::{Parser, Subcommand};

use opaitokens::cli::login::AccountArgs;
use opaitokens::cli::output::{print_error, OutputMode};
use opaitokens::pool::SharedTokenRequest;

#[derive(Parser)]
#[command(name = "opaitokens", version, about = "Obtain OpenAI access tokens and manage fakeopen share tokens")]
struct Cli {
    /// Path to a config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print an access token
    Login {
        #[arg(long, env = "OPAI_EMAIL")]
        email: Option<String>,

        #[arg(long, env = "OPAI_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// One-time code for accounts with MFA enabled
        #[arg(long, env = "OPAI_MFA_CODE", hide_env_values = true)]
        mfa_code: Option<String>,

        /// Print `<verifier>|<code>` instead of exchanging the code
        #[arg(long, conflicts_with = "proxy")]
        code_only: bool,

        /// Log in through the discovery host instead of the browser flow
        #[arg(long)]
        proxy: bool,
    },

    /// Mint a new access token from a refresh token
    Refresh {
        #[arg(long, env = "OPAI_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },

    /// Manage share tokens
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },

    /// Manage pool tokens
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },

    /// Exchange session tokens
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum ShareAction {
    /// Register a share token for an access token
    Register {
        /// Stable name the share token is keyed by
        unique_name: String,

        #[arg(long)]
        access_token: String,

        /// Lifetime in seconds, 0 to follow the access token
        #[arg(long, default_value_t = 0)]
        expires_in: i64,

        /// Restrict use to this site
        #[arg(long, default_value = "")]
        site_limit: String,

        /// Hide conversation history from share token users
        #[arg(long)]
        hide_conversations: bool,
    },
    /// Revoke a share token
    Revoke {
        unique_name: String,

        #[arg(long)]
        access_token: String,
    },
}

#[derive(Subcommand)]
enum PoolAction {
    /// Create a pool token or replace the members of an existing one
    Renew {
        /// Share tokens to pool
        #[arg(required = true, num_args = 1..)]
        share_tokens: Vec<String>,

        /// Existing pool token to update
        #[arg(long, default_value = "")]
        pool_token: String,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Get an access token for a session token
    Exchange { session_token: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OPAITOKENS_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = OutputMode::from_flag(cli.json);

    if let Err(e) = run(cli, mode).await {
        print_error(&e, mode, std::io::stderr().is_terminal());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<(), opaitokens::OpaiError> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Login {
            email,
            password,
            mfa_code,
            code_only,
            proxy,
        } => {
            let account = AccountArgs {
                email,
                password,
                mfa_code,
            };
            opaitokens::cli::login::run_login(config, &account, code_only, proxy, mode).await
        }
        Commands::Refresh { refresh_token } => {
            opaitokens::cli::login::run_refresh(config, &refresh_token, mode).await
        }
        Commands::Share { action } => match action {
            ShareAction::Register {
                unique_name,
                access_token,
                expires_in,
                site_limit,
                hide_conversations,
            } => {
                let req = SharedTokenRequest {
                    unique_name,
                    access_token,
                    expires_in,
                    site_limit,
                    show_conversations: !hide_conversations,
                };
                opaitokens::cli::pool::run_share_register(config, &req, mode).await
            }
            ShareAction::Revoke {
                unique_name,
                access_token,
            } => {
                opaitokens::cli::pool::run_share_revoke(config, &unique_name, &access_token, mode)
                    .await
            }
        },
        Commands::Pool { action } => match action {
            PoolAction::Renew {
                share_tokens,
                pool_token,
            } => {
                opaitokens::cli::pool::run_pool_renew(config, &share_tokens, &pool_token, mode)
                    .await
            }
        },
        Commands::Session { action } => match action {
            SessionAction::Exchange { session_token } => {
                opaitokens::cli::pool::run_session_exchange(config, &session_token, mode).await
            }
        },
    }
}

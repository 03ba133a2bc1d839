pub mod cache;
pub mod discovery;
pub mod flow;
pub mod identity;
pub mod pkce;
pub mod session;
pub mod steps;
pub mod token;

pub use cache::TokenCache;
pub use discovery::{Endpoints, CLIENT_ID, REDIRECT_URI};
pub use flow::{run_login_flow, Authenticator};
pub use identity::Identity;
pub use pkce::{generate_pkce, generate_pkce_with, PkceChallenge};
pub use session::{HttpSettings, RedirectPolicy, Session};
pub use steps::{FlowContext, FlowMode, FlowOutcome, Step, Transition};
pub use token::{AuthorizationCode, Credential};

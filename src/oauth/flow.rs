use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::config::OpaiConfig;
use crate::error::OpaiError;
use crate::oauth::cache::TokenCache;
use crate::oauth::discovery::Endpoints;
use crate::oauth::identity::Identity;
use crate::oauth::pkce::generate_pkce_with;
use crate::oauth::session::{HttpSettings, Session, StepRequest};
use crate::oauth::steps::{FlowContext, FlowMode, FlowOutcome, Step, Transition};
use crate::oauth::token::{parse_token_response, refresh_form, AuthorizationCode, Credential};

/// Drive one login flow from preauth to its outcome.
///
/// Requests are issued strictly in order; the first failure ends the flow.
pub async fn run_login_flow(
    session: &Session,
    ctx: &mut FlowContext,
    endpoints: &Endpoints,
) -> Result<FlowOutcome, OpaiError> {
    let mut step = Step::Preauth;
    loop {
        let name = step.name();
        let request = step.request(ctx, endpoints)?;
        tracing::debug!(step = name, method = %request.method, "sending request");
        let response = session.send(name, request).await?;
        match step.transition(ctx, response, endpoints, Utc::now())? {
            Transition::Continue(next) => step = next,
            Transition::Finished(outcome) => return Ok(outcome),
        }
    }
}

/// Obtains credentials for one account, reusing cached tokens while they last.
///
/// Calls through the same `Authenticator` are serialized by `&mut self`.
/// Authenticators that share a [`TokenCache`] may run concurrently; the
/// last flow to finish overwrites the cached credential.
pub struct Authenticator {
    identity: Identity,
    endpoints: Endpoints,
    settings: HttpSettings,
    cache: TokenCache,
    rng: Box<dyn RngCore + Send>,
    last: Option<Credential>,
}

impl Authenticator {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            endpoints: Endpoints::default(),
            settings: HttpSettings::default(),
            cache: TokenCache::new(),
            rng: Box::new(StdRng::from_os_rng()),
            last: None,
        }
    }

    pub fn from_config(identity: Identity, config: &OpaiConfig) -> Self {
        Self::new(identity)
            .with_endpoints(config.endpoints())
            .with_settings(config.http_settings())
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_settings(mut self, settings: HttpSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the random source used for PKCE verifiers.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Refresh token from the last completed flow, empty if none.
    pub fn refresh_token(&self) -> &str {
        self.last
            .as_ref()
            .map(|cred| cred.refresh_token.as_str())
            .unwrap_or_default()
    }

    /// Run the login flow in `mode`, short-circuiting on a cached token.
    ///
    /// The cache is only consulted in [`FlowMode::Token`]; an authorization
    /// code is single-use and always needs a fresh flow.
    pub async fn authenticate(
        &mut self,
        use_cache: bool,
        mode: FlowMode,
    ) -> Result<FlowOutcome, OpaiError> {
        if use_cache && mode == FlowMode::Token {
            if let Some(cred) = self.cached() {
                return Ok(FlowOutcome::Token(cred));
            }
        }

        self.identity.validate()?;

        let pkce = generate_pkce_with(&mut *self.rng);
        let mut ctx = FlowContext::new(self.identity.clone(), mode, pkce);
        let session = Session::new(&self.settings)?;

        tracing::debug!(email = %self.identity.email, ?mode, "starting login flow");
        let outcome = run_login_flow(&session, &mut ctx, &self.endpoints).await?;

        if let FlowOutcome::Token(cred) = &outcome {
            self.remember(cred.clone());
        }
        tracing::info!(email = %self.identity.email, ?mode, "login flow completed");
        Ok(outcome)
    }

    pub async fn access_token(&mut self, use_cache: bool) -> Result<Credential, OpaiError> {
        self.authenticate(use_cache, FlowMode::Token)
            .await?
            .into_credential()
    }

    pub async fn auth_for_code(&mut self) -> Result<AuthorizationCode, OpaiError> {
        self.authenticate(false, FlowMode::AuthForCode)
            .await?
            .into_code()
    }

    /// Log in through the discovery host's `/auth/login` endpoint instead of
    /// replaying the browser flow.
    pub async fn authenticate_via_proxy(&mut self, use_cache: bool) -> Result<Credential, OpaiError> {
        if use_cache {
            if let Some(cred) = self.cached() {
                return Ok(cred);
            }
        }

        self.identity.validate()?;

        let form = vec![
            ("username", self.identity.email.clone()),
            ("password", self.identity.password.clone()),
            ("mfa_code", self.identity.mfa_code.clone().unwrap_or_default()),
        ];
        let cred = self
            .post_token_form("proxy login", self.endpoints.proxy_login_url(), form)
            .await?;
        self.remember(cred.clone());
        Ok(cred)
    }

    /// Mint a new access token from a refresh token.
    ///
    /// Keeps the old refresh token when the provider does not rotate it.
    pub async fn refresh_access_token(&mut self, refresh_token: &str) -> Result<Credential, OpaiError> {
        if refresh_token.is_empty() {
            return Err(OpaiError::InvalidInput("refresh token is empty".into()));
        }

        let mut cred = self
            .post_token_form("token refresh", self.endpoints.token_url(), refresh_form(refresh_token))
            .await?;
        if cred.refresh_token.is_empty() {
            cred.refresh_token = refresh_token.to_string();
        }
        self.remember(cred.clone());
        Ok(cred)
    }

    fn cached(&self) -> Option<Credential> {
        let email = &self.identity.email;
        if let Some(cred) = self.cache.get_valid(email) {
            tracing::debug!(email = %email, "using cached credential");
            return Some(cred);
        }
        if self.cache.get(email).is_some() {
            tracing::warn!(email = %email, "cached credential expired, logging in again");
        }
        None
    }

    fn remember(&mut self, cred: Credential) {
        self.cache.store(&self.identity.email, cred.clone());
        self.last = Some(cred);
    }

    async fn post_token_form(
        &self,
        context: &str,
        url: String,
        form: Vec<(&'static str, String)>,
    ) -> Result<Credential, OpaiError> {
        let session = Session::new(&self.settings)?;
        let response = session.send(context, StepRequest::post_form(url, form)).await?;
        parse_token_response(context, response.status, &response.body, Utc::now())
    }
}
